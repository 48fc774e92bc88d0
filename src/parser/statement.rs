// Copyright (c) Chris Gunn.
// Licensed under the MIT license.

use std::ops::Range;

use chumsky::{error::Error as _, prelude::*};

use crate::ast::{
    AssignOp, BinaryOp, DirectiveKind, Expr, ExprAssign, ExprKind, ExprMember, ExprOpBinary, StatementClass,
    StatementDecl, StatementDirective, StatementKind, StatementScope,
};

use super::lexer::Token;

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let span = left.span.start..right.span.end;
    Expr {
        kind: ExprKind::Binary(ExprOpBinary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }),
        span,
    }
}

pub fn gen_expr_parser() -> impl Parser<Token, Expr, Error = Simple<Token>> + Clone {
    recursive(|expr| {
        let ident = select! { Token::Ident(name) => name }.labelled("identifier");

        let real = select! { Token::Real(value) => value }.try_map(|value, span| {
            value
                .parse::<f64>()
                .map(ExprKind::Real)
                .map_err(|_| Simple::custom(span, format!("invalid number '{}'", value)))
        });

        let integer = select! { Token::Integer(value) => value }.try_map(|value, span| {
            i64::try_from(value)
                .map(ExprKind::Integer)
                .map_err(|_| Simple::custom(span, format!("integer literal '{}' is out of range", value)))
        });

        let literal = select! { Token::String(value) => ExprKind::String(value) }
            .or(integer)
            .or(real)
            .labelled("value");

        let atom = literal
            .or(ident.clone().map(ExprKind::Name))
            .map_with_span(|kind, span| Expr { kind, span })
            .or(expr
                .clone()
                .delimited_by(just(Token::LParen), just(Token::RParen))
                .map_with_span(|inner: Expr, span: Range<usize>| Expr { kind: inner.kind, span }));

        let member = atom
            .then(
                just(Token::Dot)
                    .ignore_then(ident.map_with_span(|name, span: Range<usize>| (name, span)))
                    .repeated(),
            )
            .foldl(|object, (member, span)| {
                let span = object.span.start..span.end;
                Expr {
                    kind: ExprKind::Member(ExprMember {
                        object: Box::new(object),
                        member,
                    }),
                    span,
                }
            });

        // `i64::MIN` has no positive counterpart, so its magnitude is only a literal when negated.
        let min_int = just(Token::Minus)
            .then(filter_map(|span: Range<usize>, token: Token| match token {
                Token::Integer(value) if value == i64::MIN.unsigned_abs() => Ok(()),
                _ => Err(Simple::expected_input_found(span, None, Some(token))),
            }))
            .map_with_span(|_, span: Range<usize>| Expr {
                kind: ExprKind::Integer(i64::MIN),
                span,
            });

        let unary = min_int.or(just(Token::Minus)
            .map_with_span(|_, span: Range<usize>| span)
            .repeated()
            .then(member)
            .foldr(|op_span, operand| {
                let span = op_span.start..operand.span.end;
                Expr {
                    kind: ExprKind::Neg(Box::new(operand)),
                    span,
                }
            }));

        let product_op = just(Token::Star)
            .to(BinaryOp::Mul)
            .or(just(Token::Slash).to(BinaryOp::Div));

        let product = unary
            .clone()
            .then(product_op.then(unary).repeated())
            .foldl(|left, (op, right)| binary(op, left, right));

        let sum_op = just(Token::Plus).to(BinaryOp::Add).or(just(Token::Minus).to(BinaryOp::Sub));

        let sum = product
            .clone()
            .then(sum_op.then(product).repeated())
            .foldl(|left, (op, right)| binary(op, left, right));

        let assign_op = just(Token::Eq)
            .to(AssignOp::Set)
            .or(just(Token::PlusEq).to(AssignOp::Add))
            .or(just(Token::MinusEq).to(AssignOp::Sub));

        // Assignment is right-associative: `a = b = 1`.
        sum.then(assign_op.then(expr).or_not())
            .try_map(|(target, assign): (Expr, Option<(AssignOp, Expr)>), _| match assign {
                None => Ok(target),
                Some((op, value)) => {
                    if target.as_path().is_none() {
                        return Err(Simple::custom(target.span, "cannot assign to this expression"));
                    }
                    let span = target.span.start..value.span.end;
                    Ok(Expr {
                        kind: ExprKind::Assign(ExprAssign {
                            op,
                            target: Box::new(target),
                            value: Box::new(value),
                        }),
                        span,
                    })
                }
            })
    })
}

/// Parses the tokens of one line into a statement.
pub fn gen_statement_parser() -> impl Parser<Token, StatementKind, Error = Simple<Token>> {
    let ident = select! { Token::Ident(name) => name }.labelled("identifier");
    let expr = gen_expr_parser();

    let directive = just(Token::Percent)
        .ignore_then(ident.clone().map_with_span(|name, span: Range<usize>| (name, span)))
        .then(select! { Token::String(path) => path }.labelled("path"))
        .try_map(|((name, name_span), path), _| {
            let kind = match name.as_str() {
                "use" => DirectiveKind::Use,
                "default" => DirectiveKind::Default,
                _ => return Err(Simple::custom(name_span, format!("unknown directive '%{}'", name))),
            };
            Ok(StatementKind::Directive(StatementDirective { kind, path }))
        });

    let class = just(Token::Ident("class".to_string()))
        .ignore_then(ident.clone())
        .then(just(Token::LBrace).or_not())
        .map(|(name, brace)| {
            StatementKind::Class(StatementClass {
                name,
                braced: brace.is_some(),
            })
        });

    let scope_begin = ident
        .clone()
        .then_ignore(just(Token::LBrace))
        .map(|name| StatementKind::ScopeBegin(StatementScope { name }));

    let block_begin = just(Token::LBrace).to(StatementKind::BlockBegin);
    let block_end = just(Token::RBrace).to(StatementKind::BlockEnd);

    let decl = ident
        .clone()
        .then(ident.map_with_span(|name, span: Range<usize>| (name, span)))
        .then(just(Token::Eq).ignore_then(expr.clone()).or_not())
        .map(|((type_name, (name, name_span)), init)| {
            StatementKind::Decl(StatementDecl {
                type_name,
                name,
                name_span,
                init,
            })
        });

    let expr_statement = expr.map(StatementKind::Expr);

    let statement = directive
        .then_ignore(end())
        .or(class.then_ignore(end()))
        .or(scope_begin.then_ignore(end()))
        .or(block_begin.then_ignore(end()))
        .or(block_end.then_ignore(end()))
        .or(decl.then_ignore(end()))
        .or(expr_statement.then_ignore(end()));

    statement
}
