// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run event log types.
//!
//! Every observable transition appends a [`RunEvent`]: per-run ordering via
//! `stream_position`, global ordering via `event_sequence`, and a
//! time-ordered `event_id` used for dedup on re-delivery.

use crate::intent::IntentKind;
use crate::policy::PolicyOutcomeKind;
use crate::request::RequestId;
use crate::scope::Scope;
use crate::signal::{SignalId, SignalType};
use crate::workflow::{WorkflowId, WorkflowStatus};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a run (one queue-job lineage's event stream).
    pub struct RunId("run-");
}

crate::define_id! {
    /// Unique identifier for a queue job.
    pub struct JobId("job-");
}

crate::define_id! {
    /// Time-ordered identifier for a run event (UUID v7 suffix).
    ///
    /// Appending an event whose ID already exists is an idempotent no-op,
    /// which makes re-delivery after a crash safe.
    pub struct EventId("evt-");
}

/// Severity class of a run event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    /// Lifecycle transition consumed by projections and replay.
    State,
    /// Informational; never drives state.
    Log,
}

crate::tagged_display! {
    EventLevel {
        State => "state",
        Log => "log",
    }
}

/// Typed payload of a run event.
///
/// Serializes with `{"type": "area:verb", ...fields}` format.
/// Unknown type tags deserialize to `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEventBody {
    // -- run lifecycle --
    #[serde(rename = "run:queued")]
    RunQueued {
        job_id: JobId,
        request_id: RequestId,
        workflow_id: WorkflowId,
    },

    #[serde(rename = "run:claimed")]
    RunClaimed {
        job_id: JobId,
        worker_id: String,
        attempt: u32,
    },

    #[serde(rename = "run:completed")]
    RunCompleted { job_id: JobId, latency_ms: u64 },

    #[serde(rename = "run:failed")]
    RunFailed {
        job_id: JobId,
        error: String,
        attempt: u32,
        /// True when the job has exhausted its attempts.
        terminal: bool,
    },

    // -- planner steps --
    #[serde(rename = "step:latency")]
    StepLatency {
        workflow_id: WorkflowId,
        step_number: u32,
        intent: IntentKind,
        latency_ms: u64,
    },

    #[serde(rename = "policy:decision")]
    PolicyDecision {
        workflow_id: WorkflowId,
        step_number: u32,
        policy_id: String,
        outcome: PolicyOutcomeKind,
    },

    #[serde(rename = "planner:validation_failure")]
    PlannerValidationFailure {
        workflow_id: WorkflowId,
        step_number: u32,
        issues: Vec<String>,
    },

    #[serde(rename = "workflow:terminal")]
    WorkflowTerminal {
        workflow_id: WorkflowId,
        status: WorkflowStatus,
    },

    // -- signals --
    #[serde(rename = "signal:received")]
    SignalReceived {
        workflow_id: WorkflowId,
        signal_id: SignalId,
        signal_type: SignalType,
    },

    #[serde(rename = "signal:consumed")]
    SignalConsumed {
        workflow_id: WorkflowId,
        signal_id: SignalId,
    },

    /// Catch-all for unknown event types (extensibility)
    #[serde(other, skip_serializing)]
    Unknown,
}

impl RunEventBody {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            RunEventBody::RunQueued { .. } => "run:queued",
            RunEventBody::RunClaimed { .. } => "run:claimed",
            RunEventBody::RunCompleted { .. } => "run:completed",
            RunEventBody::RunFailed { .. } => "run:failed",
            RunEventBody::StepLatency { .. } => "step:latency",
            RunEventBody::PolicyDecision { .. } => "policy:decision",
            RunEventBody::PlannerValidationFailure { .. } => "planner:validation_failure",
            RunEventBody::WorkflowTerminal { .. } => "workflow:terminal",
            RunEventBody::SignalReceived { .. } => "signal:received",
            RunEventBody::SignalConsumed { .. } => "signal:consumed",
            RunEventBody::Unknown => "unknown",
        }
    }

    /// Default severity for this event class.
    pub fn level(&self) -> EventLevel {
        match self {
            RunEventBody::StepLatency { .. } | RunEventBody::Unknown => EventLevel::Log,
            _ => EventLevel::State,
        }
    }
}

/// One appended run event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEvent {
    pub event_id: EventId,
    pub run_id: RunId,
    pub scope: Scope,
    /// Per-run position, strictly increasing from 1.
    pub stream_position: u64,
    /// Global append order across all runs.
    pub event_sequence: u64,
    pub level: EventLevel,
    /// Correlation: the originating request ID.
    pub trace_id: String,
    /// Causation: the queue job (or other actor) that produced this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,
    pub occurred_at_ms: u64,
    pub body: RunEventBody,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
