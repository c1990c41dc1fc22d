//! Projects a parsed script into its CLI schema: the ordered argument
//! declarations plus the file-header descriptions. The schema is what the
//! CLI layer binds flags and positionals against.

use std::collections::HashSet;

use crate::ast::{ArgDeclaration, ArrayLiteral, LiteralOrArray, RslTypeKind, Stmt, Token};
use crate::parser::ParseError;
use crate::value::Value;

/// One declared script argument, projected for CLI binding.
#[derive(Debug, Clone)]
pub struct ScriptArg {
    /// The in-script identifier.
    pub name: String,
    /// The external flag/positional name: the rename if present, else the
    /// identifier.
    pub api_name: String,
    pub short: Option<char>,
    pub arg_type: RslTypeKind,
    pub is_optional: bool,
    pub default: Option<Value>,
    pub help: String,
    pub decl: ArgDeclaration,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptMetadata {
    /// The file header body, when the script declares one.
    pub header: Option<String>,
    /// Declarations in source order; source order is positional order.
    pub args: Vec<ScriptArg>,
}

impl ScriptMetadata {
    /// First non-blank header line, used as the short description.
    pub fn short_description(&self) -> Option<String> {
        self.header
            .as_ref()?
            .lines()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.trim().to_string())
    }

    pub fn long_description(&self) -> Option<String> {
        self.header.clone()
    }
}

pub fn extract_metadata(stmts: &[Stmt]) -> Result<ScriptMetadata, ParseError> {
    let mut metadata = ScriptMetadata::default();
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut seen_shorts: HashSet<char> = HashSet::new();

    for stmt in stmts {
        match stmt {
            Stmt::FileHeader { token } => {
                metadata.header = Some(token.str_literal().to_string());
            }
            Stmt::ArgBlock { stmts, .. } => {
                for decl in stmts {
                    let arg = project_declaration(decl)?;
                    let clash = !seen_names.insert(arg.api_name.clone())
                        || (arg.name != arg.api_name && !seen_names.insert(arg.name.clone()));
                    if clash {
                        return Err(duplicate_error(
                            &decl.identifier,
                            format!("Duplicate argument name: {}", arg.api_name),
                        ));
                    }
                    if let Some(short) = arg.short {
                        if !seen_shorts.insert(short) {
                            return Err(duplicate_error(
                                decl.flag.as_ref().unwrap_or(&decl.identifier),
                                format!("Duplicate short flag: {}", short),
                            ));
                        }
                    }
                    metadata.args.push(arg);
                }
            }
            _ => {}
        }
    }
    Ok(metadata)
}

/// The generated usage line: `<script> [flags] <required> [optional]`.
pub fn generate_use_string(script_name: &str, args: &[ScriptArg]) -> String {
    let mut use_string = format!("{} [flags]", script_name);
    for arg in args {
        if arg.is_optional || arg.arg_type == RslTypeKind::Bool {
            use_string.push_str(&format!(" [{}]", arg.api_name));
        } else {
            use_string.push_str(&format!(" <{}>", arg.api_name));
        }
    }
    use_string
}

fn project_declaration(decl: &ArgDeclaration) -> Result<ScriptArg, ParseError> {
    let name = decl.identifier.lexeme.clone();
    let api_name = decl
        .rename
        .as_ref()
        .map(|t| t.str_literal().to_string())
        .unwrap_or_else(|| name.clone());

    let short = match &decl.flag {
        Some(flag) => {
            let mut chars = flag.lexeme.chars();
            let first = chars.next();
            if chars.next().is_some() {
                return Err(duplicate_error(
                    flag,
                    format!("Short flag must be a single character: {}", flag.lexeme),
                ));
            }
            first
        }
        None => None,
    };

    let default = decl
        .default
        .as_ref()
        .map(|loa| literal_or_array_value(loa, decl.arg_type.kind));

    Ok(ScriptArg {
        name,
        api_name,
        short,
        arg_type: decl.arg_type.kind,
        is_optional: decl.is_optional,
        default,
        help: decl.comment.str_literal().to_string(),
        decl: decl.clone(),
    })
}

/// Convert a default literal into its runtime value. The parser has
/// already enforced that literal types match the declared type.
fn literal_or_array_value(loa: &LiteralOrArray, kind: RslTypeKind) -> Value {
    match loa {
        LiteralOrArray::Literal(literal) => match kind {
            RslTypeKind::Str => Value::String(literal.token.str_literal().to_string()),
            RslTypeKind::Int => Value::Int(literal.token.int_literal()),
            RslTypeKind::Float => Value::Float(literal.token.float_literal()),
            RslTypeKind::Bool => Value::Bool(literal.token.bool_literal()),
            other => panic!(
                "internal error: scalar default for array type {:?}",
                other
            ),
        },
        LiteralOrArray::Array(array) => match array {
            ArrayLiteral::Empty { .. } => match kind.element_type() {
                RslTypeKind::Str => Value::StringArray(Vec::new()),
                RslTypeKind::Int => Value::IntArray(Vec::new()),
                RslTypeKind::Float => Value::FloatArray(Vec::new()),
                RslTypeKind::Bool => Value::BoolArray(Vec::new()),
                other => panic!("internal error: array of array type {:?}", other),
            },
            ArrayLiteral::Strings(literals) => Value::StringArray(
                literals
                    .iter()
                    .map(|l| l.token.str_literal().to_string())
                    .collect(),
            ),
            ArrayLiteral::Ints(literals) => {
                Value::IntArray(literals.iter().map(|l| l.token.int_literal()).collect())
            }
            ArrayLiteral::Floats(literals) => {
                Value::FloatArray(literals.iter().map(|l| l.token.float_literal()).collect())
            }
            ArrayLiteral::Bools(literals) => {
                Value::BoolArray(literals.iter().map(|l| l.token.bool_literal()).collect())
            }
        },
    }
}

fn duplicate_error(token: &Token, message: String) -> ParseError {
    ParseError::Unexpected {
        line: token.line,
        col: token.col,
        lexeme: token.printable_lexeme(),
        message,
    }
}
