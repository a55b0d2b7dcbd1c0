// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

crate::define_id! {
    /// Test-only ID type.
    pub struct TestId("tst-");
}

#[test]
fn generated_ids_have_prefix_and_fill_the_buffer() {
    let id = TestId::new();
    assert!(id.as_str().starts_with(TestId::PREFIX));
    assert_eq!(id.as_str().len(), ID_MAX_LEN);
}

#[test]
fn generated_ids_are_unique() {
    let a = TestId::new();
    let b = TestId::new();
    assert_ne!(a, b);
}

#[test]
fn generated_ids_are_time_ordered() {
    // UUID v7 suffixes sort by creation time within the same prefix.
    // Ordering is only defined across millisecond boundaries.
    let first = TestId::new();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = TestId::new();
    assert!(first.as_str() < second.as_str());
}

#[test]
fn from_string_accepts_caller_supplied_ids() {
    let id = TestId::from_string("tst-abc");
    assert_eq!(id, "tst-abc");
    assert_eq!(id.to_string(), "tst-abc");
    assert_eq!(TestId::from("tst-abc"), id);
}

#[test]
fn equal_strings_are_equal_ids() {
    // Trailing bytes are zeroed, so derived equality matches string
    // equality regardless of construction path.
    let a = TestId::from_string("tst-x");
    let b = TestId::from(String::from("tst-x"));
    assert_eq!(a, b);

    use std::collections::HashSet;
    let set: HashSet<TestId> = [a, b].into_iter().collect();
    assert_eq!(set.len(), 1);
}

#[test]
fn idbuf_roundtrips_through_serde() {
    let id = TestId::new();
    let json = serde_json::to_string(&id).unwrap();
    let back: TestId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, back);
}

#[test]
fn idbuf_rejects_oversized_deserialization() {
    let long = format!("\"{}\"", "x".repeat(ID_MAX_LEN + 1));
    let result: Result<TestId, _> = serde_json::from_str(&long);
    assert!(result.is_err());
}

#[test]
fn empty_idbuf_is_empty() {
    let id = IdBuf::new("");
    assert!(id.is_empty());
    assert_eq!(id.as_str(), "");
}

#[test]
fn short_truncates_at_char_boundaries() {
    assert_eq!(short("abcdef", 3), "abc");
    assert_eq!(short("ab", 3), "ab");
    // Multi-byte character straddling the cut: back off, don't split.
    assert_eq!(short("aé", 2), "a");
}
