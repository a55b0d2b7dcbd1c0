// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::jobs::{enqueue_workflow_job, ClaimRequest};
use charter_core::{PlannerIntent, ReadAccess, RunEventBody, Scope, WorkflowStatus};
use charter_engine::test_support::{test_request, LoopHarness};
use charter_storage::{QueueJobCreate, QueueJobStatus, RunStatus};
use serde_json::json;

fn scope() -> Scope {
    Scope::new("tenant-a", "ws-1")
}

fn config(worker: &str) -> WorkerConfig {
    WorkerConfig {
        worker_id: worker.into(),
        claim_limit: 4,
        lease_ms: 30_000,
        execute_timeout_ms: 1_000,
        backoff: RetryBackoff::Fixed { delay_ms: 5_000 },
    }
}

/// Commit the request and enqueue its lineage job, like the control plane
/// does before any worker runs.
fn enqueue(harness: &LoopHarness, request: &charter_core::ObjectiveRequestV1) -> charter_storage::QueueJob {
    harness
        .store
        .with_transaction(|state| {
            state.insert_objective_request(request)?;
            Ok(())
        })
        .unwrap();
    enqueue_workflow_job(
        &harness.store,
        &harness.clock,
        QueueJobCreate {
            scope: scope(),
            workflow_id: request.workflow_id,
            request_id: request.request_id.clone(),
            thread_id: request.thread_id.clone(),
            objective_prompt: request.objective_prompt.clone(),
            max_attempts: 3,
            available_at_ms: None,
        },
    )
    .unwrap()
}

#[tokio::test]
async fn worker_executes_queued_job_to_completion() {
    let harness = LoopHarness::builder()
        .intents(vec![PlannerIntent::Complete { output: Some(json!({"msg": "ok"})) }])
        .build();
    let request = test_request("r1", "hello");
    let job = enqueue(&harness, &request);

    let worker = Worker::new(
        std::sync::Arc::new(harness.planner_loop),
        harness.clock.clone(),
        config("worker-a"),
    );
    assert_eq!(worker.run_once().await.unwrap(), 1);

    let stored = harness
        .store
        .read(|s| s.find_queue_job_by_id(job.job_id.as_str()).cloned())
        .unwrap();
    assert_eq!(stored.status, QueueJobStatus::Completed);

    let run = harness.store.read(|s| s.runs[job.run_id.as_str()].clone());
    assert_eq!(run.status, RunStatus::Success);

    let workflow = harness
        .store
        .read(|s| s.get_workflow(&scope(), request.workflow_id.as_str()).cloned())
        .unwrap();
    assert_eq!(workflow.status, WorkflowStatus::Completed);

    // Lifecycle events in stream order: queued, claimed, then the step
    // telemetry, then completed.
    let names: Vec<&'static str> = harness.store.read(|s| {
        s.read_run_events(job.run_id.as_str(), &ReadAccess::CrossTenant)
            .iter()
            .map(|e| e.body.name())
            .collect()
    });
    assert_eq!(names.first(), Some(&"run:queued"));
    assert_eq!(names.get(1), Some(&"run:claimed"));
    assert_eq!(names.last(), Some(&"run:completed"));
    assert!(names.contains(&"workflow:terminal"));
}

#[tokio::test]
async fn empty_queue_claims_nothing() {
    let harness = LoopHarness::builder().intents(vec![]).build();
    let worker = Worker::new(
        std::sync::Arc::new(harness.planner_loop),
        harness.clock.clone(),
        config("worker-a"),
    );
    assert_eq!(worker.run_once().await.unwrap(), 0);
}

#[tokio::test]
async fn planner_failure_requeues_with_backoff() {
    // Empty script: the planner fails on the first call.
    let harness = LoopHarness::builder().intents(vec![]).build();
    let request = test_request("r1", "will fail");
    let job = enqueue(&harness, &request);

    let worker = Worker::new(
        std::sync::Arc::new(harness.planner_loop),
        harness.clock.clone(),
        config("worker-a"),
    );
    worker.run_once().await.unwrap();

    let stored = harness
        .store
        .read(|s| s.find_queue_job_by_id(job.job_id.as_str()).cloned())
        .unwrap();
    assert_eq!(stored.status, QueueJobStatus::Queued);
    assert_eq!(stored.attempt_count, 1);
    assert_eq!(stored.available_at_ms, harness.clock.epoch_ms() + 5_000);
    assert!(stored.last_error.as_deref().unwrap().starts_with("INTERNAL_ERROR"));

    // Not claimable until the backoff elapses.
    assert_eq!(worker.run_once().await.unwrap(), 0);
    harness.clock.advance_ms(5_000);
    assert_eq!(worker.run_once().await.unwrap(), 1);
}

#[tokio::test]
async fn exhausted_attempts_fail_the_run_terminally() {
    let harness = LoopHarness::builder().intents(vec![]).build();
    let request = test_request("r1", "always fails");
    let job = enqueue(&harness, &request);

    let worker = Worker::new(
        std::sync::Arc::new(harness.planner_loop),
        harness.clock.clone(),
        config("worker-a"),
    );
    for _ in 0..3 {
        worker.run_once().await.unwrap();
        harness.clock.advance_ms(5_000);
    }

    let stored = harness
        .store
        .read(|s| s.find_queue_job_by_id(job.job_id.as_str()).cloned())
        .unwrap();
    assert_eq!(stored.status, QueueJobStatus::Failed);
    assert_eq!(stored.attempt_count, 3);

    let run = harness.store.read(|s| s.runs[job.run_id.as_str()].clone());
    assert_eq!(run.status, RunStatus::Failed);

    let terminal_failures = harness.store.read(|s| {
        s.read_run_events(job.run_id.as_str(), &ReadAccess::CrossTenant)
            .iter()
            .filter(|e| matches!(e.body, RunEventBody::RunFailed { terminal: true, .. }))
            .count()
    });
    assert_eq!(terminal_failures, 1);
}

#[tokio::test]
async fn waiting_workflow_completes_job_until_signal_requeues_it() {
    let harness = LoopHarness::builder()
        .intents(vec![PlannerIntent::AskUser { question: "go?".to_string() }])
        .build();
    let request = test_request("r1", "ask");
    let job = enqueue(&harness, &request);

    let planner_loop = std::sync::Arc::new(harness.planner_loop);
    let worker = Worker::new(planner_loop.clone(), harness.clock.clone(), config("worker-a"));
    worker.run_once().await.unwrap();

    // The workflow parked; the job lineage is complete for now.
    let stored = harness
        .store
        .read(|s| s.find_queue_job_by_id(job.job_id.as_str()).cloned())
        .unwrap();
    assert_eq!(stored.status, QueueJobStatus::Completed);

    // A user reply flips the lineage back to queued...
    harness.planner.push(PlannerIntent::Complete { output: None });
    planner_loop
        .resume_with_signal(&charter_core::WorkflowSignalV1 {
            signal_id: charter_core::SignalId::new("sig-go"),
            tenant_id: "tenant-a".to_string(),
            workspace_id: "ws-1".to_string(),
            workflow_id: request.workflow_id,
            signal_type: charter_core::SignalType::UserInput,
            payload: json!({"message": "go"}),
            occurred_at: "2026-01-10T12:10:00Z".to_string(),
        })
        .unwrap();
    let requeued = harness
        .store
        .read(|s| s.find_queue_job_by_id(job.job_id.as_str()).cloned())
        .unwrap();
    assert_eq!(requeued.status, QueueJobStatus::Queued);

    // ...and the next poll resumes within the same workflow identity.
    assert_eq!(worker.run_once().await.unwrap(), 1);
    let workflow = harness
        .store
        .read(|s| s.get_workflow(&scope(), request.workflow_id.as_str()).cloned())
        .unwrap();
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert_eq!(workflow.steps.len(), 2);
}

#[tokio::test]
async fn two_workers_never_share_a_claim() {
    let harness = LoopHarness::builder()
        .intents(vec![PlannerIntent::Complete { output: None }])
        .build();
    let request = test_request("r1", "single claim");
    enqueue(&harness, &request);

    let claimed_a = crate::jobs::claim_workflow_jobs(
        &harness.store,
        &harness.clock,
        &ClaimRequest {
            worker_id: "worker-a".to_string(),
            limit: 10,
            lease_ms: 30_000,
            tenant_id: None,
            workspace_id: None,
        },
    )
    .unwrap();
    let claimed_b = crate::jobs::claim_workflow_jobs(
        &harness.store,
        &harness.clock,
        &ClaimRequest {
            worker_id: "worker-b".to_string(),
            limit: 10,
            lease_ms: 30_000,
            tenant_id: None,
            workspace_id: None,
        },
    )
    .unwrap();

    assert_eq!(claimed_a.len(), 1);
    assert!(claimed_b.is_empty());
}
