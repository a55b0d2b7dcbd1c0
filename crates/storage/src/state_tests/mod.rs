// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the projection tables.

use super::*;
use charter_core::{
    ObjectiveRequestV1, ReadAccess, Scope, SignalId, SignalRecord, SignalStatus, SignalType,
    Workflow, WorkflowId,
};
use serde_json::json;

mod decisions;
mod run_events;
mod signals;
mod workflows;

pub(crate) fn scope() -> Scope {
    Scope::new("tenant-a", "ws-1")
}

pub(crate) fn other_scope() -> Scope {
    Scope::new("tenant-b", "ws-1")
}

pub(crate) fn signal_record(scope: &Scope, signal_id: &str, occurred_at_ms: u64) -> SignalRecord {
    SignalRecord {
        signal_id: SignalId::new(signal_id),
        scope: scope.clone(),
        workflow_id: WorkflowId::from_string("wfl-test-1"),
        signal_type: SignalType::UserInput,
        payload: json!({"message": "hi"}),
        occurred_at_ms,
        status: SignalStatus::Received,
    }
}

#[test]
fn insert_objective_request_is_idempotent_for_identical_content() {
    let mut state = StoreState::new();
    let request = ObjectiveRequestV1::builder().build();

    assert!(state.insert_objective_request(&request).unwrap());
    assert!(!state.insert_objective_request(&request).unwrap());
    assert_eq!(state.objective_requests.len(), 1);
}

#[test]
fn insert_objective_request_conflicts_on_different_content() {
    let mut state = StoreState::new();
    let request = ObjectiveRequestV1::builder().build();
    state.insert_objective_request(&request).unwrap();

    let altered = ObjectiveRequestV1::builder().objective_prompt("something else").build();
    assert!(matches!(
        state.insert_objective_request(&altered),
        Err(crate::StoreError::Conflict(_))
    ));
}

#[test]
fn list_objective_requests_is_scoped_and_ordered() {
    let mut state = StoreState::new();
    let later = ObjectiveRequestV1::builder()
        .request_id("req-b")
        .occurred_at("2026-01-11T09:00:00Z")
        .build();
    let earlier = ObjectiveRequestV1::builder()
        .request_id("req-a")
        .occurred_at("2026-01-10T09:00:00Z")
        .build();
    let foreign = ObjectiveRequestV1::builder().tenant_id("tenant-b").request_id("req-c").build();
    state.insert_objective_request(&later).unwrap();
    state.insert_objective_request(&earlier).unwrap();
    state.insert_objective_request(&foreign).unwrap();

    let listed = state.list_objective_requests("tenant-a", "ws-1");
    let ids: Vec<&str> = listed.iter().map(|r| r.request_id.as_str()).collect();
    assert_eq!(ids, vec!["req-a", "req-b"]);
}

#[test]
fn same_workflow_id_is_isolated_per_scope() {
    let mut state = StoreState::new();
    let ours = Workflow::builder().scope(scope()).build();
    let theirs = Workflow::builder().scope(other_scope()).build();

    state.upsert_workflow(&ours).unwrap();
    state.upsert_workflow(&theirs).unwrap();

    assert_eq!(state.workflows.len(), 2);
    assert!(state.get_workflow(&scope(), "wfl-test-1").is_some());
    let cross = state.find_workflow_by_id("wfl-test-1", &ReadAccess::Scoped(other_scope()));
    assert_eq!(cross.unwrap().scope, other_scope());
}
