use std::collections::HashMap;

use crate::ast::{JsonPath, Token};
use crate::evaluator::EvalError;
use crate::value::Value;

/// A JSON-path binding: declared but unpopulated until a rad block that
/// cites the identifier runs.
#[derive(Debug, Clone)]
pub struct JsonFieldVar {
    pub name: Token,
    pub path: JsonPath,
}

/// The interpreter's variable environment.
///
/// A single global scope suffices for the current grammar; nested scopes
/// are reserved for future control flow. The interpreter owns the
/// environment outright, so JSON-path bindings carry no back-reference —
/// the rad block that resolves them writes straight back here.
#[derive(Debug, Default)]
pub struct Env {
    vars: HashMap<String, Value>,
    json_fields: HashMap<String, JsonFieldVar>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn exists(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Look up a variable, citing the referencing token on failure.
    pub fn get_by_token(&self, token: &Token) -> Result<&Value, EvalError> {
        self.vars.get(&token.lexeme).ok_or_else(|| {
            EvalError::name(
                token,
                format!("Undefined variable referenced: {}", token.lexeme),
            )
        })
    }

    /// Like [`get_by_token`](Self::get_by_token), restricted to an
    /// acceptable-type whitelist described by type names.
    pub fn get_by_token_expecting(
        &self,
        token: &Token,
        acceptable: &[&str],
    ) -> Result<&Value, EvalError> {
        let value = self.get_by_token(token)?;
        if acceptable.is_empty() || acceptable.contains(&value.type_name()) {
            Ok(value)
        } else {
            Err(EvalError::type_error(
                token,
                format!(
                    "Variable type mismatch: {} is {}, expected one of: {}",
                    token.lexeme,
                    value.type_name(),
                    acceptable.join(", ")
                ),
            ))
        }
    }

    /// Declare a JSON-path binding. The identifier is seeded with an empty
    /// string array so expressions that reference it before the rad block
    /// runs see a defined value.
    pub fn assign_json_field(&mut self, name: Token, path: JsonPath) {
        self.set(&name.lexeme, Value::StringArray(Vec::new()));
        self.json_fields
            .insert(name.lexeme.clone(), JsonFieldVar { name, path });
    }

    pub fn get_json_field(&self, name: &Token) -> Result<&JsonFieldVar, EvalError> {
        self.json_fields.get(&name.lexeme).ok_or_else(|| {
            EvalError::name(
                name,
                format!("Undefined json field referenced: {}", name.lexeme),
            )
        })
    }

    /// All variables in name order, for deterministic shell exports.
    pub fn vars_sorted(&self) -> Vec<(&String, &Value)> {
        let mut entries: Vec<_> = self.vars.iter().collect();
        entries.sort_by_key(|(name, _)| name.as_str());
        entries
    }
}
