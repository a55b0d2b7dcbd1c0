// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn key_ignores_arg_construction_order() {
    let a = IdempotencyKey::derive("t", "req-1", 0, "echo", &json!({"a": 1, "b": 2}));
    let b = IdempotencyKey::derive("t", "req-1", 0, "echo", &json!({"b": 2, "a": 1}));
    assert_eq!(a, b);
}

#[test]
fn key_varies_with_each_identity_component() {
    let base = IdempotencyKey::derive("t", "req-1", 0, "echo", &json!({"a": 1}));
    let cases = [
        IdempotencyKey::derive("t2", "req-1", 0, "echo", &json!({"a": 1})),
        IdempotencyKey::derive("t", "req-2", 0, "echo", &json!({"a": 1})),
        IdempotencyKey::derive("t", "req-1", 1, "echo", &json!({"a": 1})),
        IdempotencyKey::derive("t", "req-1", 0, "other", &json!({"a": 1})),
        IdempotencyKey::derive("t", "req-1", 0, "echo", &json!({"a": 2})),
    ];
    for other in cases {
        assert_ne!(base.key, other.key);
    }
}

#[test]
fn key_is_a_sha256_hex_digest() {
    let k = IdempotencyKey::derive("t", "req-1", 0, "echo", &json!({}));
    assert_eq!(k.key.len(), 64);
    assert!(k.key.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn store_returns_recorded_outcome() {
    let store = IdempotencyStore::new();
    let key = IdempotencyKey::derive("t", "req-1", 0, "echo", &json!({}));
    assert!(store.get(&key.key).is_none());

    let record = IdempotencyRecord {
        fingerprint: key.fingerprint.clone(),
        outcome: ActionOutcome {
            action_class: "echoed".to_string(),
            provider: "fake".to_string(),
            data: json!({"x": 1}),
            external_id: None,
        },
        recorded_at_ms: 42,
    };
    store.put(&key.key, record.clone());
    assert_eq!(store.get(&key.key), Some(record));
    assert_eq!(store.len(), 1);
}

#[test]
fn failure_ledger_keeps_terminal_reason() {
    let store = IdempotencyStore::new();
    store.record_failure(
        "k1",
        FailureRecord {
            reason: TerminalReason::MaxAttemptsExhausted,
            last_error_code: "HTTP_503".to_string(),
            last_error_message: "unavailable".to_string(),
            last_attempt_at_ms: 99,
            attempts: 3,
        },
    );
    let failure = store.failure("k1").unwrap();
    assert_eq!(failure.reason, TerminalReason::MaxAttemptsExhausted);
    assert_eq!(failure.attempts, 3);
    assert_eq!(TerminalReason::NonRetryable.to_string(), "non_retryable");
}

#[tokio::test]
async fn gate_is_shared_per_key() {
    let store = IdempotencyStore::new();
    let a = store.gate("k1");
    let b = store.gate("k1");
    let other = store.gate("k2");

    let _held = a.lock().await;
    // Same key: already held.
    assert!(b.try_lock().is_err());
    // Different key: free.
    assert!(other.try_lock().is_ok());
}
