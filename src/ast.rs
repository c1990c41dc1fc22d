//! Abstract syntax tree for RSL scripts.
//!
//! The AST is split into focused submodules:
//!
//! - **[tokens]** - lexical tokens with source positions
//! - **[expressions]** - expression nodes and literal forms
//! - **[statements]** - statements, argument declarations, rad blocks
//! - **[paths]** - JSON path elements
//!
//! Both families are plain enums matched exhaustively at each use site; no
//! visitor indirection.
pub mod expressions;
pub mod paths;
pub mod statements;
pub mod tokens;

pub use expressions::{ArrayLiteral, Expr, FunctionCall, Literal, LiteralOrArray};
pub use paths::{JsonPath, JsonPathElement};
pub use statements::{
    ArgDeclaration, RadBlock, RadStmt, RslType, RslTypeKind, Stmt, SwitchBlock, SwitchStmt,
};
pub use tokens::{Token, TokenLiteral, TokenType};
