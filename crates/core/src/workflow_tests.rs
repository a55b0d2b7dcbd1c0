// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::intent::PlannerInputV1;
use serde_json::json;

fn input(step_index: u32) -> PlannerInputV1 {
    PlannerInputV1 {
        objective_prompt: "objective".to_string(),
        memory_context: vec![],
        prior_step_summaries: vec![],
        policy_constraints: vec![],
        available_tools: vec!["echo".to_string()],
        step_index,
        scope: Scope::new("tenant-a", "ws-1"),
    }
}

fn step(n: u32, intent: PlannerIntent, status: StepStatus) -> PlannerStep {
    PlannerStep {
        workflow_id: WorkflowId::from_string("wfl-test-1"),
        step_number: n,
        intent_kind: intent.kind(),
        status,
        planner_input: input(n),
        planner_intent: intent,
        tool_result: None,
        error_code: None,
        created_at_ms: 1_000_000 + u64::from(n),
    }
}

#[test]
fn new_workflow_starts_running_with_no_steps() {
    let wf = Workflow::new(
        WorkflowId::from_string("wfl-a"),
        Scope::new("tenant-a", "ws-1"),
        "thread-1",
        5,
    );
    assert_eq!(wf.status, WorkflowStatus::Running);
    assert!(wf.steps.is_empty());
    assert_eq!(wf.next_step_number(), 0);
    assert!(!wf.is_terminal());
}

#[test]
fn terminal_statuses() {
    assert!(WorkflowStatus::Completed.is_terminal());
    assert!(WorkflowStatus::Failed.is_terminal());
    assert!(!WorkflowStatus::Running.is_terminal());
    assert!(!WorkflowStatus::WaitingSignal.is_terminal());
}

#[test]
fn next_step_number_tracks_len() {
    let mut wf = Workflow::builder().build();
    wf.steps.push(step(
        0,
        PlannerIntent::ToolCall { tool_name: "echo".into(), args: json!({}) },
        StepStatus::ToolExecuted,
    ));
    assert_eq!(wf.next_step_number(), 1);
}

#[test]
fn summary_uses_tool_name_for_tool_calls() {
    let s = step(
        0,
        PlannerIntent::ToolCall { tool_name: "send_mail".into(), args: json!({}) },
        StepStatus::ToolExecuted,
    );
    let summary = s.summary();
    assert_eq!(summary.step_number, 0);
    assert_eq!(summary.intent, IntentKind::ToolCall);
    assert_eq!(summary.detail, "send_mail");
}

#[test]
fn summary_prefers_error_code_on_failure() {
    let mut s = step(
        2,
        PlannerIntent::ToolCall { tool_name: "send_mail".into(), args: json!({}) },
        StepStatus::Failed,
    );
    s.error_code = Some("POLICY_BLOCKED".to_string());
    assert_eq!(s.summary().detail, "POLICY_BLOCKED");
}

#[test]
fn summary_uses_question_for_ask_user() {
    let s = step(
        1,
        PlannerIntent::AskUser { question: "proceed?".into() },
        StepStatus::WaitingSignal,
    );
    assert_eq!(s.summary().detail, "proceed?");
}

#[test]
fn status_display() {
    assert_eq!(WorkflowStatus::WaitingSignal.to_string(), "waiting_signal");
    assert_eq!(StepStatus::ToolExecuted.to_string(), "tool_executed");
}

#[test]
fn workflow_roundtrips_through_serde() {
    let mut wf = Workflow::builder().build();
    wf.steps.push(step(
        0,
        PlannerIntent::Complete { output: Some(json!({"msg": "ok"})) },
        StepStatus::Completed,
    ));
    let json = serde_json::to_string(&wf).unwrap();
    let back: Workflow = serde_json::from_str(&json).unwrap();
    assert_eq!(wf, back);
}
