//! Extraction helpers over loosely-typed cluster API responses.
//!
//! A missing or wrongly-typed field yields a zero value, never an error:
//! objects in real clusters routinely omit optional blocks and the snapshot
//! should degrade to empty attributes instead of failing collection.
use serde_json::Map;
use serde_json::Value as Json;

/// Walk a path of object keys, if every step exists.
pub fn get<'a>(value: &'a Json, path: &[&str]) -> Option<&'a Json> {
    path.iter().try_fold(value, |value, key| value.get(key))
}

/// String at path, empty when missing or not a string.
pub fn string(value: &Json, path: &[&str]) -> String {
    get(value, path)
        .and_then(Json::as_str)
        .unwrap_or("")
        .to_string()
}

/// Boolean at path, `false` when missing.
pub fn boolean(value: &Json, path: &[&str]) -> bool {
    get(value, path).and_then(Json::as_bool).unwrap_or(false)
}

/// Integer at path, `0` when missing.
pub fn integer(value: &Json, path: &[&str]) -> i64 {
    get(value, path).and_then(Json::as_i64).unwrap_or(0)
}

/// Whether a non-null value exists at path.
pub fn present(value: &Json, path: &[&str]) -> bool {
    get(value, path).map(|value| !value.is_null()).unwrap_or(false)
}

/// Iterator over the array at path, empty when missing.
pub fn items<'a>(value: &'a Json, path: &[&str]) -> std::slice::Iter<'a, Json> {
    get(value, path)
        .and_then(Json::as_array)
        .map(|entries| entries.iter())
        .unwrap_or_default()
}

/// Vector of the strings in the array at path.
pub fn strings(value: &Json, path: &[&str]) -> Vec<String> {
    items(value, path)
        .filter_map(Json::as_str)
        .map(String::from)
        .collect()
}

/// The object's `metadata.labels` map, if present.
pub fn labels(value: &Json) -> Option<&Map<String, Json>> {
    get(value, &["metadata", "labels"]).and_then(Json::as_object)
}

/// One label value, empty when the label is absent.
pub fn label(value: &Json, name: &str) -> String {
    string(value, &["metadata", "labels", name])
}
