// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::state::run_events::RunEventAppend;
use crate::state::types::RunStatus;
use charter_core::{EventId, EventLevel, JobId, RunEventBody, RunId, WorkflowStatus};

fn body() -> RunEventBody {
    RunEventBody::WorkflowTerminal {
        workflow_id: WorkflowId::from_string("wfl-test-1"),
        status: WorkflowStatus::Completed,
    }
}

fn append(run: &str) -> RunEventAppend {
    RunEventAppend::new(RunId::from_string(run), scope(), "req-1", 1_000, body())
}

#[test]
fn stream_positions_increase_per_run() {
    let mut state = StoreState::new();
    assert_eq!(state.append_run_event(append("run-1")), Some(1));
    assert_eq!(state.append_run_event(append("run-1")), Some(2));
    // Another run has its own stream.
    assert_eq!(state.append_run_event(append("run-2")), Some(1));
    assert_eq!(state.append_run_event(append("run-1")), Some(3));
}

#[test]
fn event_sequence_is_global() {
    let mut state = StoreState::new();
    state.append_run_event(append("run-1"));
    state.append_run_event(append("run-2"));
    state.append_run_event(append("run-1"));

    let sequences: Vec<u64> = state.run_events.iter().map(|e| e.event_sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
}

#[test]
fn duplicate_event_id_is_ignored() {
    let mut state = StoreState::new();
    let mut first = append("run-1");
    first.event_id = EventId::from_string("evt-fixed");
    let mut second = append("run-1");
    second.event_id = EventId::from_string("evt-fixed");

    assert_eq!(state.append_run_event(first), Some(1));
    assert_eq!(state.append_run_event(second), None);
    assert_eq!(state.run_events.len(), 1);
}

#[test]
fn read_run_events_orders_by_stream_position() {
    let mut state = StoreState::new();
    for _ in 0..3 {
        state.append_run_event(append("run-1"));
    }
    state.append_run_event(append("run-2"));

    let events = state.read_run_events("run-1", &ReadAccess::Scoped(scope()));
    let positions: Vec<u64> = events.iter().map(|e| e.stream_position).collect();
    assert_eq!(positions, vec![1, 2, 3]);
}

#[test]
fn read_run_events_respects_scope() {
    let mut state = StoreState::new();
    state.append_run_event(append("run-1"));

    assert!(state
        .read_run_events("run-1", &ReadAccess::Scoped(other_scope()))
        .is_empty());
    assert_eq!(
        state.read_run_events("run-1", &ReadAccess::CrossTenant).len(),
        1
    );
}

#[test]
fn level_defaults_from_body() {
    let mut state = StoreState::new();
    state.append_run_event(append("run-1"));
    assert_eq!(state.run_events[0].level, EventLevel::State);
}

#[test]
fn run_lifecycle_tracks_latency_from_first_start() {
    let mut state = StoreState::new();
    let run_id = RunId::from_string("run-1");
    state.ensure_run(&run_id, &JobId::from_string("job-1"), &scope());
    assert_eq!(state.runs["run-1"].status, RunStatus::Queued);

    state.mark_run_running("run-1", 1_000).unwrap();
    // Reclaim after a crash does not reset the start time.
    state.mark_run_running("run-1", 2_000).unwrap();
    state.mark_run_success("run-1", 5_000).unwrap();

    let run = &state.runs["run-1"];
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.latency_ms, Some(4_000));
}

#[test]
fn mark_run_failed_records_error() {
    let mut state = StoreState::new();
    let run_id = RunId::from_string("run-1");
    state.ensure_run(&run_id, &JobId::from_string("job-1"), &scope());
    state.mark_run_running("run-1", 1_000).unwrap();
    state.mark_run_failed("run-1", 3_000, "TOOL_FAILURE").unwrap();

    let run = &state.runs["run-1"];
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("TOOL_FAILURE"));
    assert!(state.mark_run_running("run-missing", 1).is_err());
}
