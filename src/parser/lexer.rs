// Copyright (c) Chris Gunn.
// Licensed under the MIT license.

use std::ops::Range;

use chumsky::{
    error::Simple,
    primitive::{any, end, filter, just, one_of},
    text::{self, TextParser},
    Parser,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Token {
    String(String),
    Ident(String),
    // Unsigned so that `-9223372036854775808` can be formed by the parser.
    Integer(u64),
    Real(String),
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    PlusEq,
    MinusEq,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Percent,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Token::String(value) => write!(f, "{:?}", value),
            Token::Ident(name) => f.write_str(name),
            Token::Integer(i) => write!(f, "{}", i),
            Token::Real(string) => f.write_str(string),
            Token::Dot => f.write_str("."),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Eq => f.write_str("="),
            Token::PlusEq => f.write_str("+="),
            Token::MinusEq => f.write_str("-="),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBrace => f.write_str("{"),
            Token::RBrace => f.write_str("}"),
            Token::Percent => f.write_str("%"),
        }
    }
}

/// Tokenizes a single source line. A `#` outside a string comments out the rest of the line.
pub fn gen_lexer() -> impl Parser<char, Vec<(Token, Range<usize>)>, Error = Simple<char>> {
    let frac = just('.').chain(text::digits(10));

    let exp = just('e')
        .or(just('E'))
        .chain(just('+').or(just('-')).or_not())
        .chain::<char, _, _>(text::digits(10));

    let number = text::int(10)
        .chain::<char, _, _>(frac.or_not().flatten())
        .chain::<char, _, _>(exp.or_not().flatten())
        .collect::<String>()
        .try_map(|string, span| {
            if string.contains(['.', 'e', 'E']) {
                return Ok(Token::Real(string));
            }
            match string.parse::<u64>() {
                Ok(i) => Ok(Token::Integer(i)),
                Err(_) => Err(Simple::custom(
                    span,
                    format!("integer literal '{}' is out of range", string),
                )),
            }
        })
        .labelled("number");

    let escape = just('\\').ignore_then(
        just('\\')
            .or(just('/'))
            .or(just('"'))
            .or(just('b').to('\x08'))
            .or(just('f').to('\x0C'))
            .or(just('n').to('\n'))
            .or(just('r').to('\r'))
            .or(just('t').to('\t'))
            .or(just('u').ignore_then(
                filter(|c: &char| c.is_digit(16))
                    .repeated()
                    .exactly(4)
                    .collect::<String>()
                    .validate(|digits, span, emit| {
                        u32::from_str_radix(&digits, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .unwrap_or_else(|| {
                                emit(Simple::custom(span, "invalid unicode character"));
                                '\u{FFFD}' // unicode replacement character
                            })
                    }),
            )),
    );

    let string = just('"')
        .ignore_then(filter(|c| *c != '\\' && *c != '"').or(escape).repeated())
        .then_ignore(just('"'))
        .collect::<String>()
        .map(Token::String)
        .labelled("string");

    let ident = text::ident().map(Token::Ident);

    // Longest match first so `+=` is not read as `+` followed by `=`.
    let op = just("+=")
        .to(Token::PlusEq)
        .or(just("-=").to(Token::MinusEq))
        .or(one_of("+-*/=%").map(|c| match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '=' => Token::Eq,
            _ => Token::Percent,
        }));

    let ctrl = one_of(".(){}").map(|c| match c {
        '.' => Token::Dot,
        '(' => Token::LParen,
        ')' => Token::RParen,
        '{' => Token::LBrace,
        _ => Token::RBrace,
    });

    let comment = just('#').then(any().repeated()).ignored();

    let token = string.or(number).or(ident).or(op).or(ctrl);

    // Leading whitespace is skipped separately so an indented comment-only line has no tokens.
    text::whitespace()
        .ignore_then(token.map_with_span(|tok, span| (tok, span)).padded().repeated())
        .then_ignore(comment.or_not())
        .then_ignore(end())
}
