use crate::ast::tokens::Token;

/// One element of a JSON path: the root marker `json`, a field name, or a
/// wildcard `*`, with an optional `[]` suffix marking "this value is an
/// array to be flattened across rows".
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPathElement {
    pub token: Token,
    pub is_array: bool,
}

impl JsonPathElement {
    pub fn is_wildcard(&self) -> bool {
        self.token.lexeme == "*"
    }

    pub fn name(&self) -> &str {
        &self.token.lexeme
    }
}

/// An ordered JSON path as declared in a path assignment. The first element
/// is always the root marker `json`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    pub elements: Vec<JsonPathElement>,
}

impl JsonPath {
    /// Dotted display form, e.g. `json.results.*[].name`.
    pub fn display(&self) -> String {
        let mut out = String::new();
        for (i, elem) in self.elements.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(elem.name());
            if elem.is_array {
                out.push_str("[]");
            }
        }
        out
    }
}
