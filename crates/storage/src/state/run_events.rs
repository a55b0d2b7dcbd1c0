// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run records and the append-only run event log.
//!
//! `stream_position` is assigned as per-run `max + 1` while the state is
//! exclusively held, so positions are strictly increasing per run and
//! consumers can rely on them for deterministic replay.

use super::types::{RunRecord, RunStatus};
use super::StoreState;
use crate::error::StoreError;
use charter_core::{EventId, JobId, ReadAccess, RunEvent, RunEventBody, RunId, Scope};

/// Input for one event append. `event_id` defaults to a fresh time-ordered
/// ID; pass an existing one to make re-delivery idempotent.
#[derive(Debug, Clone)]
pub struct RunEventAppend {
    pub event_id: EventId,
    pub run_id: RunId,
    pub scope: Scope,
    pub trace_id: String,
    pub causation_id: Option<String>,
    pub occurred_at_ms: u64,
    pub body: RunEventBody,
}

impl RunEventAppend {
    pub fn new(
        run_id: RunId,
        scope: Scope,
        trace_id: impl Into<String>,
        occurred_at_ms: u64,
        body: RunEventBody,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            run_id,
            scope,
            trace_id: trace_id.into(),
            causation_id: None,
            occurred_at_ms,
            body,
        }
    }

    pub fn caused_by(mut self, causation_id: impl Into<String>) -> Self {
        self.causation_id = Some(causation_id.into());
        self
    }
}

impl StoreState {
    /// Append a run event, assigning stream position and global sequence.
    ///
    /// Returns the assigned stream position, or `None` when the event ID was
    /// already appended (idempotent re-delivery).
    pub fn append_run_event(&mut self, append: RunEventAppend) -> Option<u64> {
        if self.run_event_ids.contains(append.event_id.as_str()) {
            return None;
        }

        let position = self
            .run_positions
            .entry(append.run_id.to_string())
            .or_insert(0);
        *position += 1;
        let stream_position = *position;

        let event_sequence = self.next_event_sequence;
        self.next_event_sequence += 1;

        self.run_event_ids.insert(append.event_id.to_string());
        let level = append.body.level();
        tracing::debug!(
            run_id = %append.run_id,
            event = append.body.name(),
            stream_position,
            "append run event"
        );
        self.run_events.push(RunEvent {
            event_id: append.event_id,
            run_id: append.run_id,
            scope: append.scope,
            stream_position,
            event_sequence,
            level,
            trace_id: append.trace_id,
            causation_id: append.causation_id,
            occurred_at_ms: append.occurred_at_ms,
            body: append.body,
        });
        Some(stream_position)
    }

    /// Events of one run in stream-position order.
    pub fn read_run_events(&self, run_id: &str, access: &ReadAccess) -> Vec<&RunEvent> {
        let mut rows: Vec<&RunEvent> = self
            .run_events
            .iter()
            .filter(|e| e.run_id == run_id && access.permits(&e.scope))
            .collect();
        rows.sort_by_key(|e| e.stream_position);
        rows
    }

    /// Create the run record for a queue-job lineage if it does not exist.
    pub fn ensure_run(&mut self, run_id: &RunId, job_id: &JobId, scope: &Scope) {
        self.runs
            .entry(run_id.to_string())
            .or_insert_with(|| RunRecord {
                run_id: *run_id,
                job_id: *job_id,
                scope: scope.clone(),
                status: RunStatus::Queued,
                started_at_ms: None,
                finished_at_ms: None,
                latency_ms: None,
                error: None,
            });
    }

    pub fn mark_run_running(&mut self, run_id: &str, now_ms: u64) -> Result<(), StoreError> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        run.status = RunStatus::Running;
        // Keep the first start on reclaim so latency covers the whole lineage.
        if run.started_at_ms.is_none() {
            run.started_at_ms = Some(now_ms);
        }
        Ok(())
    }

    pub fn mark_run_success(&mut self, run_id: &str, now_ms: u64) -> Result<(), StoreError> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        run.status = RunStatus::Success;
        run.finished_at_ms = Some(now_ms);
        run.latency_ms = run.started_at_ms.map(|s| now_ms.saturating_sub(s));
        Ok(())
    }

    pub fn mark_run_failed(
        &mut self,
        run_id: &str,
        now_ms: u64,
        error: impl Into<String>,
    ) -> Result<(), StoreError> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        run.status = RunStatus::Failed;
        run.finished_at_ms = Some(now_ms);
        run.latency_ms = run.started_at_ms.map(|s| now_ms.saturating_sub(s));
        run.error = Some(error.into());
        Ok(())
    }
}
