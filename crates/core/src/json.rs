// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical JSON for idempotency fingerprints.
//!
//! Object keys are sorted recursively so that two argument payloads that are
//! structurally equal always serialize to the same string, regardless of
//! construction order. Canonicalization is a fixed point: applying it twice
//! yields the same value.

use serde_json::{Map, Value};

/// Recursively sort object keys. Arrays keep their order (order is
/// significant for tool arguments).
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonical string form of a JSON value.
pub fn stable_string(value: &Value) -> String {
    canonicalize(value).to_string()
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
