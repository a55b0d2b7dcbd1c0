// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::runtime::LoopConfig;
use crate::test_support::{test_request, GateToolApproval, LoopHarness};
use charter_core::{RunId, WorkflowSignalV1};
use charter_storage::WorkflowMessageThread;
use serde_json::json;

fn scope() -> Scope {
    Scope::new("tenant-a", "ws-1")
}

fn tool_call(tool: &str, args: Value) -> PlannerIntent {
    PlannerIntent::ToolCall { tool_name: tool.to_string(), args }
}

fn signal(id: &str, workflow_id: &str, signal_type: SignalType, payload: Value) -> WorkflowSignalV1 {
    WorkflowSignalV1 {
        signal_id: SignalId::new(id),
        tenant_id: "tenant-a".to_string(),
        workspace_id: "ws-1".to_string(),
        workflow_id: workflow_id.into(),
        signal_type,
        payload,
        occurred_at: "2026-01-10T12:05:00Z".to_string(),
    }
}

async fn parked_on_approval(harness: &LoopHarness) -> (charter_core::ObjectiveRequestV1, String) {
    let request = test_request("r1", "needs sign-off");
    let result = harness.planner_loop.run_request(&request).await.unwrap();
    assert_eq!(result.status, WorkflowStatus::WaitingSignal);
    let approval_id = harness
        .store
        .read(|state| {
            state
                .get_workflow(&scope(), result.workflow_id.as_str())
                .and_then(|w| w.pending_approval.as_ref().map(|p| p.approval_id.to_string()))
        })
        .unwrap();
    (request, approval_id)
}

fn approval_harness() -> LoopHarness {
    LoopHarness::builder()
        .intents(vec![tool_call("echo", json!({"x": 1}))])
        .approval(std::sync::Arc::new(GateToolApproval { tool_name: "echo".to_string() }))
        .build()
}

#[tokio::test]
async fn approved_signal_executes_the_parked_intent_once() {
    let harness = approval_harness();
    let (request, approval_id) = parked_on_approval(&harness).await;

    let ack = harness
        .planner_loop
        .resume_with_signal(&signal(
            "sig-approve",
            request.workflow_id.as_str(),
            SignalType::Approval,
            json!({"approval_id": approval_id, "decision": "approved"}),
        ))
        .unwrap();
    assert_eq!(ack.status, "resumed");

    harness.planner.push(PlannerIntent::Complete { output: None });
    let result = harness.planner_loop.run_request(&request).await.unwrap();

    assert_eq!(result.status, WorkflowStatus::Completed);
    assert_eq!(result.steps[0].status, StepStatus::ToolExecuted);
    assert_eq!(result.steps[0].step_number, 0, "same step number after resume");
    assert_eq!(harness.echo.calls(), 1);

    let approvals = harness
        .store
        .read(|state| state.list_approval_decisions(&scope(), request.workflow_id.as_str()).len());
    // Pending + approved.
    assert_eq!(approvals, 2);
}

#[tokio::test]
async fn rejected_signal_fails_the_step_without_side_effect() {
    let harness = approval_harness();
    let (request, approval_id) = parked_on_approval(&harness).await;

    harness
        .planner_loop
        .resume_with_signal(&signal(
            "sig-reject",
            request.workflow_id.as_str(),
            SignalType::Approval,
            json!({"approval_id": approval_id, "decision": "rejected"}),
        ))
        .unwrap();

    harness.planner.push(PlannerIntent::Complete { output: None });
    let result = harness.planner_loop.run_request(&request).await.unwrap();

    assert_eq!(result.steps[0].status, StepStatus::Failed);
    assert_eq!(result.steps[0].error_code.as_deref(), Some("APPROVAL_REJECTED"));
    assert_eq!(harness.echo.calls(), 0);
}

#[tokio::test]
async fn duplicate_signal_causes_exactly_one_transition() {
    let harness = approval_harness();
    let (request, approval_id) = parked_on_approval(&harness).await;

    let payload = json!({"approval_id": approval_id, "decision": "approved"});
    let first = signal("sig-dup", request.workflow_id.as_str(), SignalType::Approval, payload.clone());
    harness.planner_loop.resume_with_signal(&first).unwrap();
    // Redelivery: acknowledged, but no second inbox entry.
    harness.planner_loop.resume_with_signal(&first).unwrap();

    let pending = harness
        .planner_loop
        .list_pending_workflow_signals(&scope(), request.workflow_id.as_str());
    assert_eq!(pending.len(), 1);

    harness.planner.push(PlannerIntent::Complete { output: None });
    let result = harness.planner_loop.run_request(&request).await.unwrap();
    assert_eq!(result.status, WorkflowStatus::Completed);
    assert_eq!(harness.echo.calls(), 1);
}

#[tokio::test]
async fn user_reply_resolves_ask_user_and_feeds_next_plan() {
    let harness = LoopHarness::builder()
        .intents(vec![PlannerIntent::AskUser { question: "confirm?".to_string() }])
        .build();
    let request = test_request("r1", "ask first");

    let result = harness.planner_loop.run_request(&request).await.unwrap();
    assert_eq!(result.status, WorkflowStatus::WaitingSignal);

    harness
        .planner_loop
        .resume_with_signal(&signal(
            "sig-reply",
            request.workflow_id.as_str(),
            SignalType::UserInput,
            json!({"message": "yes"}),
        ))
        .unwrap();

    harness.planner.push(PlannerIntent::Complete { output: None });
    let result = harness.planner_loop.run_request(&request).await.unwrap();

    assert_eq!(result.status, WorkflowStatus::Completed);
    assert_eq!(result.steps[0].status, StepStatus::Completed);
    let reply = result.steps[0].tool_result.as_ref().unwrap();
    assert_eq!(reply["user_reply"]["message"], "yes");

    // The post-resume planner call saw the resolved step.
    let inputs = harness.planner.seen_inputs.lock();
    let last = inputs.last().unwrap();
    assert_eq!(last.prior_step_summaries.len(), 1);
    assert_eq!(last.step_index, 1);
}

#[tokio::test]
async fn signals_drain_in_occurred_at_order() {
    let harness = LoopHarness::builder()
        .intents(vec![PlannerIntent::AskUser { question: "which?".to_string() }])
        .build();
    let request = test_request("r1", "ordering");
    harness.planner_loop.run_request(&request).await.unwrap();

    let mut late = signal(
        "sig-late",
        request.workflow_id.as_str(),
        SignalType::ExternalEvent,
        json!({"n": 2}),
    );
    late.occurred_at = "2026-01-10T12:30:00Z".to_string();
    let mut early = signal(
        "sig-early",
        request.workflow_id.as_str(),
        SignalType::UserInput,
        json!({"message": "first"}),
    );
    early.occurred_at = "2026-01-10T12:10:00Z".to_string();

    harness.planner_loop.resume_with_signal(&late).unwrap();
    harness.planner_loop.resume_with_signal(&early).unwrap();

    harness.planner.push(PlannerIntent::Complete { output: None });
    harness.planner_loop.run_request(&request).await.unwrap();

    let signals = harness
        .store
        .read(|state| {
            state
                .list_signals(&scope(), Some(request.workflow_id.as_str()))
                .iter()
                .map(|s| (s.signal_id.to_string(), s.status))
                .collect::<Vec<_>>()
        });
    assert_eq!(signals[0].0, "sig-early");
    assert!(signals.iter().all(|(_, status)| *status == SignalStatus::Acknowledged));
}

#[tokio::test]
async fn signal_for_unknown_workflow_is_rejected() {
    let harness = LoopHarness::builder().intents(vec![]).build();
    let err = harness
        .planner_loop
        .resume_with_signal(&signal("sig-x", "wfl-ghost", SignalType::UserInput, json!({})))
        .unwrap_err();
    assert!(matches!(err, EngineError::WorkflowNotFound(_)));
}

#[tokio::test]
async fn signal_for_terminal_workflow_is_rejected() {
    let harness = LoopHarness::builder()
        .intents(vec![PlannerIntent::Complete { output: None }])
        .build();
    let request = test_request("r1", "done");
    harness.planner_loop.run_request(&request).await.unwrap();

    let err = harness
        .planner_loop
        .resume_with_signal(&signal(
            "sig-late",
            request.workflow_id.as_str(),
            SignalType::UserInput,
            json!({}),
        ))
        .unwrap_err();
    assert!(matches!(err, EngineError::Contract(_)));
}

#[tokio::test]
async fn provider_callback_receipt_dedups() {
    let harness = LoopHarness::builder()
        .intents(vec![PlannerIntent::AskUser { question: "?".to_string() }])
        .build();
    let request = test_request("r1", "cb");
    harness.planner_loop.run_request(&request).await.unwrap();

    let callback = ProviderCallbackV1 {
        provider: "scheduler".to_string(),
        provider_team_id: "T1".to_string(),
        event_id: "Ev100".to_string(),
        tenant_id: "tenant-a".to_string(),
        workspace_id: "ws-1".to_string(),
        workflow_id: request.workflow_id,
        signal_type: SignalType::Timer,
        payload: json!({"fired": true}),
        occurred_at: "2026-01-10T13:00:00Z".to_string(),
    };

    harness.planner_loop.resume_with_provider_callback(&callback).unwrap();
    harness.planner_loop.resume_with_provider_callback(&callback).unwrap();

    let pending = harness
        .planner_loop
        .list_pending_workflow_signals(&scope(), request.workflow_id.as_str());
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].signal_type, SignalType::Timer);
}

#[tokio::test]
async fn ingest_inbound_message_resolves_thread_and_enqueues_user_input() {
    let harness = LoopHarness::builder()
        .intents(vec![PlannerIntent::AskUser { question: "reply?".to_string() }])
        .build();
    let request = test_request("r1", "threaded");
    harness.planner_loop.run_request(&request).await.unwrap();

    harness
        .store
        .with_transaction(|state| {
            state.upsert_message_thread(WorkflowMessageThread {
                channel_type: "channel".to_string(),
                channel_id: "C9".to_string(),
                thread_id: "171.001".to_string(),
                provider_team_id: Some("T1".to_string()),
                scope: scope(),
                workflow_id: request.workflow_id,
                run_id: RunId::from_string("run-1"),
            });
            Ok(())
        })
        .unwrap();

    let message = InboundMessage {
        provider: "slack".to_string(),
        provider_team_id: "T1".to_string(),
        event_id: "Ev200".to_string(),
        channel_type: "channel".to_string(),
        channel_id: "C9".to_string(),
        thread_id: "171.001".to_string(),
        message_id: "m1".to_string(),
        user_id: "U1".to_string(),
        message: "yes go ahead".to_string(),
    };

    let ack = harness.planner_loop.ingest_inbound_message(&message).unwrap().unwrap();
    assert_eq!(ack.signal_type, SignalType::UserInput);

    // Second delivery of the same event is a no-op.
    assert!(harness.planner_loop.ingest_inbound_message(&message).unwrap().is_none());

    harness.planner.push(PlannerIntent::Complete { output: None });
    let result = harness.planner_loop.run_request(&request).await.unwrap();
    assert_eq!(result.status, WorkflowStatus::Completed);
    let reply = result.steps[0].tool_result.as_ref().unwrap();
    assert_eq!(reply["user_reply"]["message"], "yes go ahead");
}

#[tokio::test]
async fn unmapped_inbound_message_is_ignored() {
    let harness = LoopHarness::builder().intents(vec![]).build();
    let message = InboundMessage {
        provider: "slack".to_string(),
        provider_team_id: "T1".to_string(),
        event_id: "Ev1".to_string(),
        channel_type: "channel".to_string(),
        channel_id: "C-unknown".to_string(),
        thread_id: "1.2".to_string(),
        message_id: "m1".to_string(),
        user_id: "U1".to_string(),
        message: "hello?".to_string(),
    };
    assert!(harness.planner_loop.ingest_inbound_message(&message).unwrap().is_none());
}

#[tokio::test]
async fn mark_workflow_signal_consumed_is_idempotent() {
    let harness = LoopHarness::builder()
        .intents(vec![PlannerIntent::AskUser { question: "?".to_string() }])
        .build();
    let request = test_request("r1", "consume");
    harness.planner_loop.run_request(&request).await.unwrap();

    harness
        .planner_loop
        .resume_with_signal(&signal(
            "sig-1",
            request.workflow_id.as_str(),
            SignalType::UserInput,
            json!({"message": "ok"}),
        ))
        .unwrap();

    assert!(harness.planner_loop.mark_workflow_signal_consumed(&scope(), "sig-1").unwrap());
    assert!(harness.planner_loop.mark_workflow_signal_consumed(&scope(), "sig-1").unwrap());
    assert!(harness
        .planner_loop
        .list_pending_workflow_signals(&scope(), request.workflow_id.as_str())
        .is_empty());
}

#[tokio::test]
async fn requeue_continuation_flips_job_back_to_queued() {
    let harness = LoopHarness::builder()
        .intents(vec![PlannerIntent::AskUser { question: "?".to_string() }])
        .config(LoopConfig::default())
        .build();
    let request = test_request("r1", "with job");

    harness
        .store
        .with_transaction(|state| {
            let job = charter_storage::QueueJob::builder()
                .workflow_id(request.workflow_id)
                .request_id(request.request_id.clone())
                .status(charter_storage::QueueJobStatus::Completed)
                .build();
            state.queue_jobs.insert(
                charter_storage::StoreState::queue_job_key(&scope(), request.request_id.as_str()),
                job,
            );
            Ok(())
        })
        .unwrap();

    harness.planner_loop.run_request(&request).await.unwrap();
    harness
        .planner_loop
        .resume_with_signal(&signal(
            "sig-1",
            request.workflow_id.as_str(),
            SignalType::UserInput,
            json!({"message": "ok"}),
        ))
        .unwrap();

    let job = harness
        .store
        .read(|state| state.get_queue_job(&scope(), request.request_id.as_str()).cloned())
        .unwrap();
    assert_eq!(job.status, charter_storage::QueueJobStatus::Queued);
    assert!(job.lease_token.is_none());
}
