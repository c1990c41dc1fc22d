/// A runtime value in an RSL script.
///
/// RSL distinguishes four scalar types and their homogeneous arrays. A
/// mixed array only arises from an untyped array expression in the script
/// itself; it prints element-wise but cannot be typed arithmetically.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    StringArray(Vec<String>),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    BoolArray(Vec<bool>),
    MixedArray(Vec<DynValue>),
}

/// Element of a mixed array. Arrays nest, so `[1, [2, ["three"]]]` is
/// representable.
#[derive(Debug, Clone, PartialEq)]
pub enum DynValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<DynValue>),
}

impl Value {
    /// Human-readable type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::StringArray(_) => "string[]",
            Value::IntArray(_) => "int[]",
            Value::FloatArray(_) => "float[]",
            Value::BoolArray(_) => "bool[]",
            Value::MixedArray(_) => "mixed array",
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Value::StringArray(_)
                | Value::IntArray(_)
                | Value::FloatArray(_)
                | Value::BoolArray(_)
                | Value::MixedArray(_)
        )
    }

    /// The printable form used by `print`, `join`, table cells, and shell
    /// exports. Strings are bare; arrays render as `[a, b, c]`.
    pub fn to_printable(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::StringArray(arr) => format_array(arr.iter().cloned()),
            Value::IntArray(arr) => format_array(arr.iter().map(|v| v.to_string())),
            Value::FloatArray(arr) => format_array(arr.iter().map(|v| v.to_string())),
            Value::BoolArray(arr) => format_array(arr.iter().map(|v| v.to_string())),
            Value::MixedArray(arr) => format_array(arr.iter().map(DynValue::to_printable)),
        }
    }

    /// The elements of any array value, dynamically typed. Returns `None`
    /// for scalars.
    pub fn dyn_elements(&self) -> Option<Vec<DynValue>> {
        match self {
            Value::StringArray(arr) => {
                Some(arr.iter().cloned().map(DynValue::String).collect())
            }
            Value::IntArray(arr) => Some(arr.iter().copied().map(DynValue::Int).collect()),
            Value::FloatArray(arr) => Some(arr.iter().copied().map(DynValue::Float).collect()),
            Value::BoolArray(arr) => Some(arr.iter().copied().map(DynValue::Bool).collect()),
            Value::MixedArray(arr) => Some(arr.clone()),
            _ => None,
        }
    }

    pub fn array_len(&self) -> Option<usize> {
        match self {
            Value::StringArray(arr) => Some(arr.len()),
            Value::IntArray(arr) => Some(arr.len()),
            Value::FloatArray(arr) => Some(arr.len()),
            Value::BoolArray(arr) => Some(arr.len()),
            Value::MixedArray(arr) => Some(arr.len()),
            _ => None,
        }
    }
}

impl DynValue {
    pub fn to_printable(&self) -> String {
        match self {
            DynValue::String(s) => s.clone(),
            DynValue::Int(n) => n.to_string(),
            DynValue::Float(n) => n.to_string(),
            DynValue::Bool(b) => b.to_string(),
            DynValue::Array(arr) => format_array(arr.iter().map(DynValue::to_printable)),
        }
    }

    /// Lift a dynamic element back into a value. Nested arrays stay mixed.
    pub fn into_value(self) -> Value {
        match self {
            DynValue::String(s) => Value::String(s),
            DynValue::Int(n) => Value::Int(n),
            DynValue::Float(n) => Value::Float(n),
            DynValue::Bool(b) => Value::Bool(b),
            DynValue::Array(arr) => Value::MixedArray(arr),
        }
    }

    /// Flatten a scalar value into a dynamic element. Arrays become nested
    /// dynamic arrays.
    pub fn from_value(value: Value) -> DynValue {
        match value {
            Value::String(s) => DynValue::String(s),
            Value::Int(n) => DynValue::Int(n),
            Value::Float(n) => DynValue::Float(n),
            Value::Bool(b) => DynValue::Bool(b),
            other => DynValue::Array(
                other
                    .dyn_elements()
                    .expect("internal error: non-scalar value without elements"),
            ),
        }
    }
}

fn format_array(items: impl Iterator<Item = String>) -> String {
    let joined: Vec<String> = items.collect();
    format!("[{}]", joined.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_scalars_bare() {
        assert_eq!(Value::String("hi".into()).to_printable(), "hi");
        assert_eq!(Value::Int(42).to_printable(), "42");
        assert_eq!(Value::Float(5.5).to_printable(), "5.5");
        assert_eq!(Value::Bool(false).to_printable(), "false");
    }

    #[test]
    fn prints_arrays_bracketed() {
        let v = Value::IntArray(vec![1, 2, 3]);
        assert_eq!(v.to_printable(), "[1, 2, 3]");
    }

    #[test]
    fn prints_nested_mixed_arrays() {
        let v = Value::MixedArray(vec![
            DynValue::Int(2),
            DynValue::Array(vec![
                DynValue::Int(3),
                DynValue::Array(vec![DynValue::String("four".into())]),
            ]),
            DynValue::Int(5),
        ]);
        assert_eq!(v.to_printable(), "[2, [3, [four]], 5]");
    }
}
