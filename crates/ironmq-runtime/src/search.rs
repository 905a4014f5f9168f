//! Membership search over decoded JSON trees.
//!
//! Queue listings come back as nested arrays of objects whose exact shape has
//! changed between service versions, so existence checks search every leaf
//! rather than relying on a fixed schema.

use serde_json::Value;

/// Check whether a string leaf equal to `needle` appears anywhere in `haystack`.
///
/// Arrays and object values are descended into; object keys are not
/// matched. Every string leaf counts, not only `name` fields, so in a queue
/// listing a queue id or the project id also matches.
pub fn contains_str(haystack: &Value, needle: &str) -> bool {
    match haystack {
        Value::String(s) => s == needle,
        Value::Array(items) => items.iter().any(|item| contains_str(item, needle)),
        Value::Object(fields) => fields.values().any(|field| contains_str(field, needle)),
        _ => false,
    }
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
