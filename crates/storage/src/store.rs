// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory transactional store.

use crate::error::StoreError;
use crate::state::StoreState;
use parking_lot::Mutex;
use std::sync::Arc;

/// The reference persistence engine.
///
/// One mutex guards the whole state, which gives transactions serializable
/// isolation for free (the per-workflow advisory lock of a relational
/// backend is subsumed by it). Rollback is whole-state snapshot/restore:
/// the `work` closure either commits everything it did or nothing.
///
/// Transactions are flattened by construction: `work` receives the single
/// mutable [`StoreState`] view, and nested units of work are plain calls on
/// that same view. The mutex is not reentrant — never call back into the
/// store from inside `work`.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreState>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(StoreState::new())) }
    }

    /// Run `work` atomically. On `Err` the state is restored to what it was
    /// before `work` ran, on any exit path.
    pub fn with_transaction<T>(
        &self,
        work: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.inner.lock();
        let snapshot = guard.clone();
        match work(&mut guard) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::debug!(error = %e, "transaction rolled back");
                *guard = snapshot;
                Err(e)
            }
        }
    }

    /// Run a read-only closure against the current state.
    pub fn read<T>(&self, read: impl FnOnce(&StoreState) -> T) -> T {
        read(&self.inner.lock())
    }

    /// Deep copy of the current state (structural sharing via clone-on-read).
    pub fn snapshot(&self) -> StoreState {
        self.inner.lock().clone()
    }

    /// Replace the state wholesale (test and replay tooling).
    pub fn restore(&self, state: StoreState) {
        *self.inner.lock() = state;
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
