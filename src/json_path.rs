//! Joins a set of JSON paths against one document into aligned columns.
//!
//! Paths are split into the prefix shared by every path and a per-path
//! suffix. The shared prefix is fanned out once (wildcards enumerate object
//! keys, `[]` enumerates array elements, both in source order); at each
//! leaf every suffix is evaluated against the subtree and the resulting
//! value lists are aligned into rows, broadcasting single values across
//! the widest fan-out.

use serde_json::Value as Json;

use crate::ast::JsonPath;

/// One traversal step. A path element `ids[]` contributes a `Field` step
/// followed by an `ArrayFan` step, so `json.*` and `json.*[].name` share
/// their wildcard even though only the latter flattens the value under it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// `[]` — enumerate array elements.
    ArrayFan,
    Field(String),
    /// `*` — enumerate object keys, capturing each key.
    Wildcard,
}

/// Resolve `paths` against `doc`, producing one column of stringified
/// values per path, all columns the same length (one entry per row).
pub fn extract_columns(doc: &Json, paths: &[JsonPath]) -> Result<Vec<Vec<String>>, String> {
    let normalized: Vec<Vec<Step>> = paths.iter().map(normalize).collect::<Result<_, _>>()?;

    let shared = shared_prefix(&normalized);
    let leaves = fan_out(doc, &shared, Vec::new())?;

    let mut columns: Vec<Vec<String>> = vec![Vec::new(); paths.len()];
    for leaf in &leaves {
        let mut per_path: Vec<Vec<String>> = Vec::with_capacity(normalized.len());
        for steps in &normalized {
            let suffix = &steps[shared.len()..];
            if suffix.is_empty() {
                per_path.push(vec![leaf_value(&shared, leaf)]);
            } else {
                per_path.push(eval_suffix(leaf.node, suffix)?);
            }
        }

        // A branch missing for any column is skipped silently.
        if per_path.iter().any(|values| values.is_empty()) {
            continue;
        }

        let rows = per_path.iter().map(|v| v.len()).max().unwrap_or(0);
        for (i, values) in per_path.iter().enumerate() {
            match values.len() {
                n if n == rows => columns[i].extend(values.iter().cloned()),
                1 => columns[i].extend(std::iter::repeat(values[0].clone()).take(rows)),
                n => {
                    return Err(format!(
                        "Cannot align fields: {} values against {} rows",
                        n, rows
                    ))
                }
            }
        }
    }
    Ok(columns)
}

/// Stringify a JSON value the way columns and `print` render it: strings
/// bare, arrays as `[a, b, c]`, objects as compact JSON.
pub fn stringify(value: &Json) -> String {
    match value {
        Json::Null => "null".to_string(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => n.to_string(),
        Json::String(s) => s.clone(),
        Json::Array(arr) => {
            let items: Vec<String> = arr.iter().map(stringify).collect();
            format!("[{}]", items.join(", "))
        }
        Json::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn normalize(path: &JsonPath) -> Result<Vec<Step>, String> {
    let (root, rest) = path
        .elements
        .split_first()
        .ok_or_else(|| "Empty json path".to_string())?;
    if root.name() != "json" {
        return Err(format!("Json path must start with 'json': {}", path.display()));
    }

    let mut steps = Vec::new();
    if root.is_array {
        steps.push(Step::ArrayFan);
    }
    for elem in rest {
        if elem.is_wildcard() {
            steps.push(Step::Wildcard);
        } else {
            steps.push(Step::Field(elem.name().to_string()));
        }
        if elem.is_array {
            steps.push(Step::ArrayFan);
        }
    }
    Ok(steps)
}

fn shared_prefix(paths: &[Vec<Step>]) -> Vec<Step> {
    let Some(first) = paths.first() else {
        return Vec::new();
    };
    let min_len = paths.iter().map(|p| p.len()).min().unwrap_or(0);
    let mut shared = Vec::new();
    for i in 0..min_len {
        if paths.iter().all(|p| p[i] == first[i]) {
            shared.push(first[i].clone());
        } else {
            break;
        }
    }
    shared
}

struct Leaf<'a> {
    node: &'a Json,
    /// The key traversed at each wildcard of the shared prefix, outermost
    /// first.
    bindings: Vec<String>,
}

/// The value of a path that ends inside the shared prefix: the traversed
/// key when the path ends at a wildcard (ignoring trailing `[]` fans),
/// else the subtree itself.
fn leaf_value(shared: &[Step], leaf: &Leaf) -> String {
    let last_named = shared.iter().rev().find(|s| !matches!(s, Step::ArrayFan));
    match last_named {
        Some(Step::Wildcard) => leaf
            .bindings
            .last()
            .cloned()
            .expect("internal error: wildcard prefix without binding"),
        _ => stringify(leaf.node),
    }
}

fn fan_out<'a>(
    node: &'a Json,
    steps: &[Step],
    bindings: Vec<String>,
) -> Result<Vec<Leaf<'a>>, String> {
    let Some((step, rest)) = steps.split_first() else {
        return Ok(vec![Leaf { node, bindings }]);
    };

    let mut leaves = Vec::new();
    match step {
        Step::ArrayFan => {
            let arr = node
                .as_array()
                .ok_or_else(|| "'[]' applied to a non-array value".to_string())?;
            for item in arr {
                leaves.extend(fan_out(item, rest, bindings.clone())?);
            }
        }
        Step::Field(name) => {
            let Some(child) = node.as_object().and_then(|obj| obj.get(name)) else {
                return Ok(leaves);
            };
            leaves.extend(fan_out(child, rest, bindings)?);
        }
        Step::Wildcard => {
            let Some(obj) = node.as_object() else {
                return Ok(leaves);
            };
            for (key, child) in obj {
                let mut bound = bindings.clone();
                bound.push(key.clone());
                leaves.extend(fan_out(child, rest, bound)?);
            }
        }
    }
    Ok(leaves)
}

/// Evaluate a per-path suffix against a subtree, producing the list of
/// values it contributes at this leaf. A suffix crossing wildcards or `[]`
/// contributes one value per combination, in traversal order.
fn eval_suffix(node: &Json, steps: &[Step]) -> Result<Vec<String>, String> {
    let Some((step, rest)) = steps.split_first() else {
        return Ok(vec![stringify(node)]);
    };

    let mut values = Vec::new();
    match step {
        Step::ArrayFan => {
            let arr = node
                .as_array()
                .ok_or_else(|| "'[]' applied to a non-array value".to_string())?;
            for item in arr {
                values.extend(eval_suffix(item, rest)?);
            }
        }
        Step::Field(name) => {
            let Some(child) = node.as_object().and_then(|obj| obj.get(name)) else {
                return Ok(values);
            };
            values.extend(eval_suffix(child, rest)?);
        }
        Step::Wildcard => {
            let Some(obj) = node.as_object() else {
                return Ok(values);
            };
            for (key, child) in obj {
                if rest.is_empty() {
                    values.push(key.clone());
                } else if rest.iter().all(|s| matches!(s, Step::ArrayFan)) {
                    // A path ending at `*[]` (or deeper fans) yields the
                    // key once per flattened element.
                    let count = count_fanned(child, rest)?;
                    values.extend(std::iter::repeat(key.clone()).take(count));
                } else {
                    values.extend(eval_suffix(child, rest)?);
                }
            }
        }
    }
    Ok(values)
}

fn count_fanned(node: &Json, fans: &[Step]) -> Result<usize, String> {
    if fans.is_empty() {
        return Ok(1);
    }
    let arr = node
        .as_array()
        .ok_or_else(|| "'[]' applied to a non-array value".to_string())?;
    let mut total = 0;
    for item in arr {
        total += count_fanned(item, &fans[1..])?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::tokens::{Token, TokenType};
    use crate::ast::{JsonPath, JsonPathElement};

    fn path(dotted: &str) -> JsonPath {
        // Build a path from its dotted form, e.g. "json.results.*[].name".
        let mut elements = Vec::new();
        for part in dotted.split('.') {
            let (name, is_array) = match part.strip_suffix("[]") {
                Some(stripped) => (stripped, true),
                None => (part, false),
            };
            elements.push(JsonPathElement {
                token: Token::new(TokenType::JsonPathElement, name, 0, 1, 1),
                is_array,
            });
        }
        JsonPath { elements }
    }

    #[test]
    fn whole_document_is_one_row() {
        let doc: Json = serde_json::from_str("[1, 2, 3]").unwrap();
        let columns = extract_columns(&doc, &[path("json")]).unwrap();
        assert_eq!(columns, vec![vec!["[1, 2, 3]".to_string()]]);
    }

    #[test]
    fn plain_fields_make_one_row() {
        let doc: Json =
            serde_json::from_str(r#"{"id": 1, "names": ["Alice", "Bob", "Charlie"]}"#).unwrap();
        let columns = extract_columns(&doc, &[path("json.id"), path("json.names")]).unwrap();
        assert_eq!(
            columns,
            vec![
                vec!["1".to_string()],
                vec!["[Alice, Bob, Charlie]".to_string()],
            ]
        );
    }

    #[test]
    fn root_array_fans_rows() {
        let doc: Json = serde_json::from_str(
            r#"[{"id": 1, "name": "Alice"}, {"id": 2, "name": "Bob"}]"#,
        )
        .unwrap();
        let columns = extract_columns(&doc, &[path("json[].id"), path("json[].name")]).unwrap();
        assert_eq!(columns[0], vec!["1", "2"]);
        assert_eq!(columns[1], vec!["Alice", "Bob"]);
    }

    #[test]
    fn wildcard_captures_keys_in_source_order() {
        let doc: Json = serde_json::from_str(
            r#"{"results": {"Alice": {"age": 30}, "Bob": {"age": 40}}}"#,
        )
        .unwrap();
        let columns =
            extract_columns(&doc, &[path("json.results.*"), path("json.results.*.age")]).unwrap();
        assert_eq!(columns[0], vec!["Alice", "Bob"]);
        assert_eq!(columns[1], vec!["30", "40"]);
    }

    #[test]
    fn wildcard_with_array_fan_repeats_key_per_element() {
        let doc: Json = serde_json::from_str(
            r#"{"London": [{"name": "Alice"}, {"name": "Bob"}], "Paris": [{"name": "Eve"}]}"#,
        )
        .unwrap();
        let columns = extract_columns(&doc, &[path("json.*"), path("json.*[].name")]).unwrap();
        assert_eq!(columns[0], vec!["London", "London", "Paris"]);
        assert_eq!(columns[1], vec!["Alice", "Bob", "Eve"]);
    }

    #[test]
    fn nested_wildcards_align_across_columns() {
        let doc: Json = serde_json::from_str(
            r#"{"York": {"Australia": [{"name": "Charlotte", "age": 35},
                                        {"name": "David", "age": 25},
                                        {"name": "Eve", "age": 20}],
                        "England": [{"name": "Alice", "age": 30},
                                    {"name": "Bob", "age": 40}]}}"#,
        )
        .unwrap();
        let columns = extract_columns(
            &doc,
            &[
                path("json.*"),
                path("json.*.*[]"),
                path("json.*.*[].name"),
                path("json.*.*[].age"),
            ],
        )
        .unwrap();
        assert_eq!(columns[0], vec!["York"; 5]);
        assert_eq!(
            columns[1],
            vec!["Australia", "Australia", "Australia", "England", "England"]
        );
        assert_eq!(
            columns[2],
            vec!["Charlotte", "David", "Eve", "Alice", "Bob"]
        );
        assert_eq!(columns[3], vec!["35", "25", "20", "30", "40"]);
    }

    #[test]
    fn deeper_suffix_fan_broadcasts_shallow_columns() {
        let doc: Json = serde_json::from_str(
            r#"{"Alice": {"ids": [{"id": 1}, {"id": 2}, {"id": 3}]},
                "Bob": {"ids": [{"id": 4}]},
                "Charlie": {"ids": [{"id": 5}, {"id": 6}]}}"#,
        )
        .unwrap();
        let columns =
            extract_columns(&doc, &[path("json.*"), path("json.*.ids[].id")]).unwrap();
        assert_eq!(
            columns[0],
            vec!["Alice", "Alice", "Alice", "Bob", "Charlie", "Charlie"]
        );
        assert_eq!(columns[1], vec!["1", "2", "3", "4", "5", "6"]);
    }

    #[test]
    fn unflattened_array_value_stringifies_whole() {
        let doc: Json = serde_json::from_str(
            r#"{"Alice": {"ids": [1, 2, 3]}, "Bob": {"ids": [4, 5]}}"#,
        )
        .unwrap();
        let columns = extract_columns(&doc, &[path("json.*"), path("json.*.ids")]).unwrap();
        assert_eq!(columns[0], vec!["Alice", "Bob"]);
        assert_eq!(columns[1], vec!["[1, 2, 3]", "[4, 5]"]);
    }

    #[test]
    fn missing_intermediate_key_skips_branch() {
        let doc: Json = serde_json::from_str(
            r#"{"a": {"x": {"v": 1}}, "b": {"y": {"v": 2}}}"#,
        )
        .unwrap();
        let columns = extract_columns(&doc, &[path("json.*"), path("json.*.x.v")]).unwrap();
        assert_eq!(columns[0], vec!["a"]);
        assert_eq!(columns[1], vec!["1"]);
    }

    #[test]
    fn terminal_brackets_on_non_array_fails() {
        let doc: Json = serde_json::from_str(r#"{"x": 1}"#).unwrap();
        let err = extract_columns(&doc, &[path("json.x[]")]).unwrap_err();
        assert!(err.contains("non-array"));
    }

    #[test]
    fn empty_fanout_emits_zero_rows() {
        let doc: Json = serde_json::from_str(r#"{}"#).unwrap();
        let columns = extract_columns(&doc, &[path("json.*"), path("json.*.age")]).unwrap();
        assert_eq!(columns, vec![Vec::<String>::new(), Vec::new()]);
    }
}
