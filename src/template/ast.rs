//! Syntax tree of a parsed template

use crate::error::Span;
use crate::value::Value;

/// A node with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

pub type SpannedExpr = Spanned<Expr>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    FloorDiv,
    Rem,
    Add,
    Sub,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Concat => "~",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

/// Filter or call argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(SpannedExpr),
    Keyword(Spanned<String>, SpannedExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    List(Vec<SpannedExpr>),
    Var(String),
    Attr {
        object: Box<SpannedExpr>,
        name: Spanned<String>,
    },
    Index {
        object: Box<SpannedExpr>,
        index: Box<SpannedExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<SpannedExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<SpannedExpr>,
        right: Box<SpannedExpr>,
    },
    /// `subject is [not] name`
    Test {
        subject: Box<SpannedExpr>,
        name: Spanned<String>,
        negated: bool,
    },
    /// `subject | name(args)`
    Filter {
        subject: Box<SpannedExpr>,
        name: Spanned<String>,
        args: Vec<Arg>,
    },
    /// `name(args)`; only builtin functions can be called
    Call {
        name: Spanned<String>,
        args: Vec<Arg>,
    },
}

/// Conditional branch of an `if` block
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: SpannedExpr,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Output(SpannedExpr),
    If {
        branches: Vec<Branch>,
        otherwise: Vec<Node>,
    },
    For {
        target: Spanned<String>,
        iterable: SpannedExpr,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Set {
        target: Spanned<String>,
        value: SpannedExpr,
    },
}

/// A parsed template, ready for evaluation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub nodes: Vec<Node>,
}
