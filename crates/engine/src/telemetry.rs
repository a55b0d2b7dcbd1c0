// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry emitter: typed run events into the store.
//!
//! The emitter is a plain value carried by whoever is writing — injected,
//! never global — so tests and alternative backends swap the store, not
//! the emitter. Events append inside the caller's transaction, which is
//! how step telemetry shares the step's commit.

use charter_core::{RunEventBody, RunId, Scope};
use charter_storage::{RunEventAppend, StoreState};

/// Correlation context for one run's events.
#[derive(Debug, Clone)]
pub struct Telemetry {
    pub run_id: RunId,
    pub scope: Scope,
    /// `trace_id` is the originating request ID.
    pub trace_id: String,
    /// `causation_id` is the queue job driving this run, when any.
    pub causation_id: Option<String>,
}

impl Telemetry {
    pub fn new(run_id: RunId, scope: Scope, trace_id: impl Into<String>) -> Self {
        Self { run_id, scope, trace_id: trace_id.into(), causation_id: None }
    }

    pub fn caused_by(mut self, causation_id: impl Into<String>) -> Self {
        self.causation_id = Some(causation_id.into());
        self
    }

    /// Append one event within the caller's transaction.
    pub fn emit(&self, state: &mut StoreState, now_ms: u64, body: RunEventBody) {
        let mut append =
            RunEventAppend::new(self.run_id, self.scope.clone(), &self.trace_id, now_ms, body);
        if let Some(causation) = &self.causation_id {
            append = append.caused_by(causation.clone());
        }
        state.append_run_event(append);
    }
}
