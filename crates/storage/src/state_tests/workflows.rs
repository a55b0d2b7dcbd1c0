// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::StoreError;
use charter_core::{
    IntentKind, PlannerInputV1, PlannerIntent, PlannerStep, StepStatus, WorkflowStatus,
};

fn step(n: u32) -> PlannerStep {
    PlannerStep {
        workflow_id: WorkflowId::from_string("wfl-test-1"),
        step_number: n,
        intent_kind: IntentKind::Complete,
        status: StepStatus::Completed,
        planner_input: PlannerInputV1 {
            objective_prompt: "x".to_string(),
            memory_context: vec![],
            prior_step_summaries: vec![],
            policy_constraints: vec![],
            available_tools: vec![],
            step_index: n,
            scope: scope(),
        },
        planner_intent: PlannerIntent::Complete { output: None },
        tool_result: None,
        error_code: None,
        created_at_ms: 1_000_000,
    }
}

#[test]
fn upsert_rejects_gapped_step_numbers() {
    let mut state = StoreState::new();
    let mut wf = Workflow::builder().build();
    wf.steps = vec![step(0), step(2)];

    assert!(matches!(
        state.upsert_workflow(&wf),
        Err(StoreError::InvariantViolation(_))
    ));
}

#[test]
fn upsert_accepts_gap_free_steps() {
    let mut state = StoreState::new();
    let mut wf = Workflow::builder().build();
    wf.steps = vec![step(0), step(1), step(2)];
    state.upsert_workflow(&wf).unwrap();
    assert_eq!(state.list_planner_steps(&scope(), "wfl-test-1").len(), 3);
}

#[test]
fn terminal_workflow_is_immutable() {
    let mut state = StoreState::new();
    let mut wf = Workflow::builder().build();
    wf.status = WorkflowStatus::Completed;
    state.upsert_workflow(&wf).unwrap();

    // Identical rewrite is a no-op.
    state.upsert_workflow(&wf).unwrap();

    // Any change is rejected.
    let mut mutated = wf.clone();
    mutated.status = WorkflowStatus::Running;
    assert!(matches!(
        state.upsert_workflow(&mutated),
        Err(StoreError::TerminalWorkflow(_))
    ));
}

#[test]
fn crafted_scope_key_cannot_read_across_the_boundary() {
    // The contract validator rejects '/' in identifiers, but the store
    // defends itself too: a scope pair whose joined key collides with a
    // foreign record must not resolve it.
    let mut state = StoreState::new();
    let wf = Workflow::builder()
        .scope(Scope::new("tenant-a", "ws/shared"))
        .build();
    state.upsert_workflow(&wf).unwrap();

    // Same joined key ("tenant-a/ws/shared/wfl-test-1"), different split.
    let crafted = Scope::new("tenant-a/ws", "shared");
    assert!(state.get_workflow(&crafted, "wfl-test-1").is_none());

    // The owning scope still reads its own record.
    assert!(state
        .get_workflow(&Scope::new("tenant-a", "ws/shared"), "wfl-test-1")
        .is_some());
}

#[test]
fn find_workflow_by_id_respects_access() {
    let mut state = StoreState::new();
    let wf = Workflow::builder().build();
    state.upsert_workflow(&wf).unwrap();

    assert!(state
        .find_workflow_by_id("wfl-test-1", &ReadAccess::Scoped(other_scope()))
        .is_none());
    assert!(state
        .find_workflow_by_id("wfl-test-1", &ReadAccess::CrossTenant)
        .is_some());
}

#[test]
fn runtime_snapshot_tracks_latest_shape() {
    let mut state = StoreState::new();
    let mut wf = Workflow::builder().build();
    wf.steps = vec![step(0)];
    state.capture_runtime_snapshot(&wf, 2_000);

    let snap = state
        .runtime_snapshots
        .get(&scope().entity_key("wfl-test-1"))
        .unwrap();
    assert_eq!(snap.step_count, 1);
    assert_eq!(snap.captured_at_ms, 2_000);
}
