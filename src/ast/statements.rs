use crate::ast::expressions::{Expr, FunctionCall, Literal, LiteralOrArray};
use crate::ast::paths::JsonPath;
use crate::ast::tokens::Token;

/// Statement nodes, in the order the parser can produce them.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// A lone expression on a line.
    Expression { expr: Expr },

    /// A function call in statement position (`print(...)`).
    FunctionStmt { call: FunctionCall },

    /// `name = expr`
    PrimaryAssign { name: Token, initializer: Expr },

    /// `name T[] = expr`
    ArrayAssign {
        name: Token,
        array_type: RslType,
        initializer: Expr,
    },

    /// `a, b = switch [discriminator]: ...`
    SwitchAssign {
        identifiers: Vec<Token>,
        block: SwitchBlock,
    },

    /// `name = json.a.b[].c`
    JsonPathAssign { identifier: Token, path: JsonPath },

    /// Leading `"""..."""` block.
    FileHeader { token: Token },

    /// `args:` block.
    ArgBlock {
        args_keyword: Token,
        stmts: Vec<ArgDeclaration>,
    },

    /// `rad <url-expr>:` block.
    RadBlock(RadBlock),
}

/// Declared types available to script arguments and array declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RslTypeKind {
    Str,
    Int,
    Float,
    Bool,
    StrArray,
    IntArray,
    FloatArray,
    BoolArray,
}

impl RslTypeKind {
    pub fn is_array(self) -> bool {
        matches!(
            self,
            RslTypeKind::StrArray
                | RslTypeKind::IntArray
                | RslTypeKind::FloatArray
                | RslTypeKind::BoolArray
        )
    }

    /// The element type of an array kind, or the kind itself for scalars.
    pub fn element_type(self) -> RslTypeKind {
        match self {
            RslTypeKind::StrArray => RslTypeKind::Str,
            RslTypeKind::IntArray => RslTypeKind::Int,
            RslTypeKind::FloatArray => RslTypeKind::Float,
            RslTypeKind::BoolArray => RslTypeKind::Bool,
            other => other,
        }
    }

    pub fn display(self) -> &'static str {
        match self {
            RslTypeKind::Str => "string",
            RslTypeKind::Int => "int",
            RslTypeKind::Float => "float",
            RslTypeKind::Bool => "bool",
            RslTypeKind::StrArray => "string[]",
            RslTypeKind::IntArray => "int[]",
            RslTypeKind::FloatArray => "float[]",
            RslTypeKind::BoolArray => "bool[]",
        }
    }
}

/// A declared type together with the token that named it.
#[derive(Debug, Clone, PartialEq)]
pub struct RslType {
    pub token: Token,
    pub kind: RslTypeKind,
}

/// One declaration inside an `args:` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgDeclaration {
    pub identifier: Token,
    /// External long flag name, when renamed via a string literal.
    pub rename: Option<Token>,
    /// Single-letter short flag identifier.
    pub flag: Option<Token>,
    pub arg_type: RslType,
    pub is_optional: bool,
    pub default: Option<LiteralOrArray>,
    /// Trailing `# ...` help text.
    pub comment: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadBlock {
    pub rad_keyword: Token,
    pub url: Expr,
    pub stmts: Vec<RadStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RadStmt {
    /// `fields a, b, c`
    Fields { identifiers: Vec<Token> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchBlock {
    pub switch_token: Token,
    pub discriminator: Option<Token>,
    pub stmts: Vec<SwitchStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwitchStmt {
    Case {
        case_keyword: Token,
        keys: Vec<Literal>,
        values: Vec<Expr>,
    },
    Default {
        default_keyword: Token,
        values: Vec<Expr>,
    },
}
