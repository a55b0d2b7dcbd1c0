// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency layer: at-most-once tool execution per step.
//!
//! The key is a sha256 over the call's identity material
//! `{tenant_id, request_id, step_number, tool_name, stable_json(args)}`.
//! A completed record short-circuits re-execution with the prior result;
//! a per-key gate serializes concurrent callers so the underlying tool
//! runs at most once even under racing workers.

use crate::registry::ActionOutcome;
use charter_core::stable_string;
use parking_lot::Mutex;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Derived idempotency identity.
///
/// `fingerprint` is the canonical material itself; two calls that hash to
/// the same `key` but carry different fingerprints are a key collision and
/// rejected as a validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey {
    pub key: String,
    pub fingerprint: String,
}

impl IdempotencyKey {
    pub fn derive(
        tenant_id: &str,
        request_id: &str,
        step_number: u32,
        tool_name: &str,
        args: &Value,
    ) -> Self {
        let material = json!({
            "tenant_id": tenant_id,
            "request_id": request_id,
            "step_number": step_number,
            "tool_name": tool_name,
            "args": args,
        });
        let fingerprint = stable_string(&material);
        let key = format!("{:x}", Sha256::digest(fingerprint.as_bytes()));
        Self { key, fingerprint }
    }
}

/// A completed execution under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyRecord {
    pub fingerprint: String,
    pub outcome: ActionOutcome,
    pub recorded_at_ms: u64,
}

/// Why a key stopped retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    NonRetryable,
    MaxAttemptsExhausted,
}

charter_core::tagged_display! {
    TerminalReason {
        NonRetryable => "non_retryable",
        MaxAttemptsExhausted => "max_attempts_exhausted",
    }
}

/// Terminal failure ledger entry for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub reason: TerminalReason,
    pub last_error_code: String,
    pub last_error_message: String,
    pub last_attempt_at_ms: u64,
    pub attempts: u32,
}

/// Process-local idempotency store.
///
/// In multi-worker deployments the records move into the persistence
/// layer; correctness does not depend on the choice because keys are
/// derived from durable identities.
#[derive(Default)]
pub struct IdempotencyStore {
    records: Mutex<HashMap<String, IdempotencyRecord>>,
    failures: Mutex<HashMap<String, FailureRecord>>,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-key gate serializing concurrent executions of the same call.
    pub fn gate(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock();
        gates.entry(key.to_string()).or_default().clone()
    }

    pub fn get(&self, key: &str) -> Option<IdempotencyRecord> {
        self.records.lock().get(key).cloned()
    }

    pub fn put(&self, key: &str, record: IdempotencyRecord) {
        self.records.lock().insert(key.to_string(), record);
    }

    pub fn record_failure(&self, key: &str, failure: FailureRecord) {
        self.failures.lock().insert(key.to_string(), failure);
    }

    pub fn failure(&self, key: &str) -> Option<FailureRecord> {
        self.failures.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "idempotency_tests.rs"]
mod tests;
