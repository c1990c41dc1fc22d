use crate::ast::tokens::{Token, TokenLiteral};

/// Expression nodes.
///
/// Every variant keeps the tokens needed to report errors against real
/// source positions. `ArrayAccess` boxes its target so index chains like
/// `a[1][1][0]` nest naturally.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Scalar literal; the payload lives on the token.
    Literal { token: Token },

    /// `[expr, expr, ...]` — heterogeneous, element-wise evaluated.
    ArrayExpr { bracket: Token, values: Vec<Expr> },

    /// `target[index]`
    ArrayAccess {
        array: Box<Expr>,
        bracket: Token,
        index: Box<Expr>,
    },

    /// `name(args...)`
    Call(FunctionCall),

    /// Plain identifier reference.
    Variable { name: Token },

    /// `left op right` for `+ - * / == != < <= > >=`
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// `left and right` / `left or right`
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// `!expr`, `not expr`, `-expr`, `+expr`
    Unary { operator: Token, right: Box<Expr> },

    /// `(expr)`
    Grouping { value: Box<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub function: Token,
    pub args: Vec<Expr>,
}

impl Expr {
    /// A representative token for error reporting, the leftmost one that
    /// identifies the expression.
    pub fn token(&self) -> &Token {
        match self {
            Expr::Literal { token } => token,
            Expr::ArrayExpr { bracket, .. } => bracket,
            Expr::ArrayAccess { array, .. } => array.token(),
            Expr::Call(call) => &call.function,
            Expr::Variable { name } => name,
            Expr::Binary { operator, .. } => operator,
            Expr::Logical { operator, .. } => operator,
            Expr::Unary { operator, .. } => operator,
            Expr::Grouping { value } => value.token(),
        }
    }
}

/// A scalar literal restricted to the contexts that demand one (argument
/// defaults, switch case keys).
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub token: Token,
}

impl Literal {
    pub fn value(&self) -> &TokenLiteral {
        self.token
            .literal
            .as_ref()
            .expect("internal error: literal token without payload")
    }
}

/// A homogeneous array literal, used where a declared type fixes the
/// element type (argument defaults).
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayLiteral {
    /// The `[]` empty-literal form.
    Empty { brackets: Token },
    Strings(Vec<Literal>),
    Ints(Vec<Literal>),
    Floats(Vec<Literal>),
    Bools(Vec<Literal>),
}

/// A literal or a homogeneous array literal.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralOrArray {
    Literal(Literal),
    Array(ArrayLiteral),
}
