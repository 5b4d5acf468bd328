//! Canonical key casing for legacy documents.
//!
//! Legacy metadata files mix `camelCase`, `PascalCase`, and `snake_case`
//! keys. Every key read from a legacy document is passed through
//! [`normalize_key`] so mapping rules can be written against one casing.

use serde_json::{Map, Value};

/// Convert a mixed-case identifier to lowercase `snake_case`.
///
/// An underscore is inserted before every uppercase letter that directly
/// follows a lowercase letter, then every character is lowercased. Runs of
/// capitals (`"ID"`, `"URLPath"`) are not split. Empty input yields an
/// empty string.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for ch in key.chars() {
        if prev_lower && ch.is_uppercase() {
            out.push('_');
        }
        out.extend(ch.to_lowercase());
        prev_lower = ch.is_lowercase();
    }
    out
}

/// Rebuild a JSON object with every top-level key normalized.
///
/// When two raw keys normalize to the same key the later one wins, which
/// matches loading the pairs into a map in file order.
pub fn normalize_keys(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (normalize_key(k), v.clone()))
        .collect()
}
