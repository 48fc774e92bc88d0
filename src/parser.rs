// Copyright (c) Chris Gunn.
// Licensed under the MIT license.

mod lexer;
mod statement;


use std::{fmt::Display, hash::Hash, ops::Range, rc::Rc};

use anyhow::{anyhow, Error};
use chumsky::{
    error::{Simple, SimpleReason},
    Parser as _, Stream,
};
use tracing::debug;

use crate::ast::{ConfFile, SourceLocation, SourceLocationSpan, Statement, StatementKind};

use lexer::{gen_lexer, Token};
use statement::gen_statement_parser;

pub struct Parser {
    lexer: Box<dyn chumsky::Parser<char, Vec<(Token, Range<usize>)>, Error = Simple<char>>>,
    parser: Box<dyn chumsky::Parser<Token, StatementKind, Error = Simple<Token>>>,
}

impl Parser {
    pub fn new() -> Parser {
        let lexer = gen_lexer();
        let parser = gen_statement_parser();
        Parser {
            lexer: Box::new(lexer),
            parser: Box::new(parser),
        }
    }

    pub fn parse(&self, filename: &str, input: &str) -> Result<ConfFile, Error> {
        let run = ParserRun::new(self, filename);
        run.parse(input)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

struct ParserRun<'a> {
    parser: &'a Parser,
    filename: Rc<String>,
}

impl ParserRun<'_> {
    fn new<'a>(parser: &'a Parser, filename: &str) -> ParserRun<'a> {
        ParserRun {
            parser,
            filename: Rc::new(filename.to_string()),
        }
    }

    fn parse(&self, input: &str) -> Result<ConfFile, Error> {
        let mut statements = Vec::new();
        for (index, line) in input.split('\n').enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if let Some(statement) = self.parse_line(index + 1, line)? {
                statements.push(statement);
            }
        }

        debug!(filename = %self.filename, statements = statements.len(), "parsed file");

        let file = ConfFile {
            filename: self.filename.clone(),
            statements,
        };
        Ok(file)
    }

    fn parse_line(&self, line_num: usize, line: &str) -> Result<Option<Statement>, Error> {
        if line.trim().is_empty() {
            return Ok(None);
        }

        let tokens = self
            .parser
            .lexer
            .parse(line)
            .map_err(|errs| self.to_error(line_num, "character", &errs))?;

        // Comment-only line.
        let (Some((_, first)), Some((_, last))) = (tokens.first(), tokens.last()) else {
            return Ok(None);
        };
        let src_loc = self.to_source_location_span(line_num, first.start..last.end);

        let line_len = line.chars().count();
        let eoi = line_len..line_len + 1;

        let kind = self
            .parser
            .parser
            .parse(Stream::from_iter(eoi, tokens.into_iter()))
            .map_err(|errs| self.to_error(line_num, "token", &errs))?;

        Ok(Some(Statement { src_loc, kind }))
    }

    // Only the first error is reported; later ones are usually knock-on effects.
    fn to_error<T: Display + Hash + Eq>(&self, line_num: usize, what: &str, errs: &[Simple<T>]) -> Error {
        let Some(err) = errs.first() else {
            return anyhow!("{}:{} parse error", self.filename, line_num);
        };

        let src_loc = self.to_source_location_span(line_num, err.span());
        let message = match err.reason() {
            SimpleReason::Custom(message) => message.clone(),
            SimpleReason::Unclosed { delimiter, .. } => format!("unclosed delimiter '{}'", delimiter),
            SimpleReason::Unexpected => match err.found() {
                Some(found) => format!("unexpected {} '{}'", what, found),
                None => "unexpected end of line".to_string(),
            },
        };
        anyhow!("{} {}", src_loc, message)
    }

    fn to_source_location_span(&self, line: usize, span: Range<usize>) -> SourceLocationSpan {
        SourceLocationSpan {
            filename: self.filename.clone(),
            start: SourceLocation {
                line,
                col: span.start + 1,
            },
            end: SourceLocation { line, col: span.end + 1 },
        }
    }
}
