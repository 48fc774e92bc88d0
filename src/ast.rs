// Copyright (c) Chris Gunn.
// Licensed under the MIT license.

use std::{fmt, ops::Range, rc::Rc};

#[derive(Clone, Debug)]
pub struct ConfFile {
    pub filename: Rc<String>,
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub src_loc: SourceLocationSpan,
    pub kind: StatementKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StatementKind {
    Directive(StatementDirective),
    Class(StatementClass),
    ScopeBegin(StatementScope),
    BlockBegin,
    BlockEnd,
    Decl(StatementDecl),
    Expr(Expr),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectiveKind {
    Use,
    Default,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatementDirective {
    pub kind: DirectiveKind,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatementClass {
    pub name: String,
    /// False when the opening brace is on the next line.
    pub braced: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatementScope {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatementDecl {
    pub type_name: String,
    pub name: String,
    pub name_span: Range<usize>,
    pub init: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// Character columns within the source line.
    pub span: Range<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    String(String),
    Integer(i64),
    Real(f64),
    Name(String),
    Member(ExprMember),
    Neg(Box<Expr>),
    Binary(ExprOpBinary),
    Assign(ExprAssign),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprMember {
    pub object: Box<Expr>,
    pub member: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprOpBinary {
    pub op: BinaryOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprAssign {
    pub op: AssignOp,
    pub target: Box<Expr>,
    pub value: Box<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SourceLocationSpan {
    pub filename: Rc<String>,
    pub start: SourceLocation,
    pub end: SourceLocation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SourceLocation {
    pub line: usize,
    pub col: usize,
}

impl Expr {
    /// Returns the `a.b.c` path this expression names, if it is a plain name or member chain.
    pub fn as_path(&self) -> Option<Vec<&str>> {
        match &self.kind {
            ExprKind::Name(name) => Some(vec![name.as_str()]),
            ExprKind::Member(ExprMember { object, member }) => {
                let mut path = object.as_path()?;
                path.push(member.as_str());
                Some(path)
            }
            _ => None,
        }
    }
}

impl SourceLocationSpan {
    /// Narrows a statement location down to a column span within the same line.
    pub fn at(&self, span: &Range<usize>) -> SourceLocationSpan {
        SourceLocationSpan {
            filename: self.filename.clone(),
            start: SourceLocation {
                line: self.start.line,
                col: span.start + 1,
            },
            end: SourceLocation {
                line: self.start.line,
                col: span.end + 1,
            },
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        })
    }
}

impl fmt::Display for SourceLocationSpan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.start.line, self.start.col)
    }
}
