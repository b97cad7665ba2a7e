//! Key-casing translation between the local (camelCase) and wire
//! (snake_case) naming conventions.
//!
//! Only JSON objects and arrays are walked. Every other variant (string,
//! number, bool, null) is a leaf and is returned untouched, which is what
//! keeps serialized timestamps and other opaque values intact: a
//! `chrono::DateTime` reaches this module as a string leaf.

use serde_json::{Map, Value};

/// `portfolioId` → `portfolio_id`.
///
/// Inserts an underscore before every ASCII uppercase letter and lowercases it.
pub fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `portfolio_id` → `portfolioId`.
///
/// Collapses every `_x` (underscore followed by one ASCII lowercase letter)
/// into `X`. Underscores followed by anything else are kept.
pub fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '_' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii_lowercase() {
                    out.push(next.to_ascii_uppercase());
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Rewrite every object key from camelCase to snake_case, recursively.
pub fn to_wire(value: Value) -> Value {
    rename_keys(value, camel_to_snake)
}

/// Rewrite every object key from snake_case to camelCase, recursively.
pub fn to_local(value: Value) -> Value {
    rename_keys(value, snake_to_camel)
}

fn rename_keys(value: Value, rename: fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (rename(&k), rename_keys(v, rename)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| rename_keys(v, rename)).collect())
        }
        leaf => leaf,
    }
}
