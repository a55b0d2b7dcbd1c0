// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use charter_core::{FakeClock, ReadAccess, Scope};
use charter_storage::MemoryStore;
use yare::parameterized;

fn scope() -> Scope {
    Scope::new("tenant-a", "ws-1")
}

fn create(request_id: &str) -> QueueJobCreate {
    QueueJobCreate {
        scope: scope(),
        workflow_id: format!("wfl-{request_id}").into(),
        request_id: request_id.into(),
        thread_id: "thread-1".to_string(),
        objective_prompt: "do the thing".to_string(),
        max_attempts: 3,
        available_at_ms: None,
    }
}

fn claim_one(store: &MemoryStore, clock: &FakeClock, worker: &str) -> Vec<QueueJob> {
    claim_workflow_jobs(
        store,
        clock,
        &ClaimRequest {
            worker_id: worker.to_string(),
            limit: 10,
            lease_ms: 30_000,
            tenant_id: None,
            workspace_id: None,
        },
    )
    .unwrap()
}

#[test]
fn enqueue_is_idempotent_on_request_id() {
    let store = MemoryStore::new();
    let clock = FakeClock::new();

    let first = enqueue_workflow_job(&store, &clock, create("req-1")).unwrap();
    let second = enqueue_workflow_job(&store, &clock, create("req-1")).unwrap();

    assert_eq!(first.job_id, second.job_id);
    assert_eq!(first.run_id, second.run_id);
    assert_eq!(store.read(|s| s.queue_jobs.len()), 1);

    // One run:queued event for the lineage.
    let queued_events = store.read(|s| {
        s.read_run_events(first.run_id.as_str(), &ReadAccess::CrossTenant)
            .iter()
            .filter(|e| matches!(e.body, charter_core::RunEventBody::RunQueued { .. }))
            .count()
    });
    assert_eq!(queued_events, 1);
}

#[test]
fn same_request_id_in_other_scope_is_a_different_lineage() {
    let store = MemoryStore::new();
    let clock = FakeClock::new();

    enqueue_workflow_job(&store, &clock, create("req-1")).unwrap();
    let mut other = create("req-1");
    other.scope = Scope::new("tenant-b", "ws-1");
    enqueue_workflow_job(&store, &clock, other).unwrap();

    assert_eq!(store.read(|s| s.queue_jobs.len()), 2);
}

#[test]
fn claim_orders_by_availability_then_creation() {
    let store = MemoryStore::new();
    let clock = FakeClock::new();

    let mut later = create("req-later");
    later.available_at_ms = Some(clock.epoch_ms() + 20);
    enqueue_workflow_job(&store, &clock, later).unwrap();
    clock.advance_ms(1);
    enqueue_workflow_job(&store, &clock, create("req-now")).unwrap();
    clock.advance_ms(30);

    let claimed = claim_one(&store, &clock, "worker-a");
    let order: Vec<&str> = claimed.iter().map(|j| j.request_id.as_str()).collect();
    assert_eq!(order, vec!["req-now", "req-later"]);
}

#[test]
fn claim_sets_lease_and_attempt() {
    let store = MemoryStore::new();
    let clock = FakeClock::new();
    enqueue_workflow_job(&store, &clock, create("req-1")).unwrap();

    let claimed = claim_one(&store, &clock, "worker-a");
    assert_eq!(claimed.len(), 1);
    let job = &claimed[0];
    assert_eq!(job.status, QueueJobStatus::Claimed);
    assert_eq!(job.attempt_count, 1);
    assert!(job.lease_token.as_ref().unwrap().starts_with("worker-a:"));
    assert_eq!(job.lease_expires_at_ms, Some(clock.epoch_ms() + 30_000));
}

#[test]
fn claimed_jobs_are_skipped_by_other_workers() {
    let store = MemoryStore::new();
    let clock = FakeClock::new();
    enqueue_workflow_job(&store, &clock, create("req-1")).unwrap();

    assert_eq!(claim_one(&store, &clock, "worker-a").len(), 1);
    assert!(claim_one(&store, &clock, "worker-b").is_empty());
}

#[test]
fn expired_lease_is_reclaimable() {
    let store = MemoryStore::new();
    let clock = FakeClock::new();
    enqueue_workflow_job(&store, &clock, create("req-1")).unwrap();

    let first = claim_one(&store, &clock, "worker-a");
    clock.advance_ms(30_001);
    let second = claim_one(&store, &clock, "worker-b");

    assert_eq!(second.len(), 1);
    assert_eq!(second[0].attempt_count, 2);
    assert_ne!(first[0].lease_token, second[0].lease_token);
}

#[test]
fn future_availability_is_not_claimable() {
    let store = MemoryStore::new();
    let clock = FakeClock::new();
    let mut input = create("req-1");
    input.available_at_ms = Some(clock.epoch_ms() + 5_000);
    enqueue_workflow_job(&store, &clock, input).unwrap();

    assert!(claim_one(&store, &clock, "worker-a").is_empty());
    clock.advance_ms(5_000);
    assert_eq!(claim_one(&store, &clock, "worker-a").len(), 1);
}

#[test]
fn claim_respects_scope_filter() {
    let store = MemoryStore::new();
    let clock = FakeClock::new();
    enqueue_workflow_job(&store, &clock, create("req-1")).unwrap();

    let foreign = claim_workflow_jobs(
        &store,
        &clock,
        &ClaimRequest {
            worker_id: "worker-a".to_string(),
            limit: 10,
            lease_ms: 1_000,
            tenant_id: Some("tenant-b".to_string()),
            workspace_id: None,
        },
    )
    .unwrap();
    assert!(foreign.is_empty());
}

#[test]
fn complete_with_stale_lease_is_a_no_op() {
    let store = MemoryStore::new();
    let clock = FakeClock::new();
    enqueue_workflow_job(&store, &clock, create("req-1")).unwrap();

    let claimed = claim_one(&store, &clock, "worker-a");
    let old_lease = claimed[0].lease_token.clone().unwrap();

    // Lease expires; another worker takes over.
    clock.advance_ms(30_001);
    let reclaimed = claim_one(&store, &clock, "worker-b");
    let job_id = reclaimed[0].job_id;

    assert!(!complete_workflow_job(&store, &clock, job_id.as_str(), &old_lease).unwrap());
    let status = store.read(|s| s.find_queue_job_by_id(job_id.as_str()).unwrap().status);
    assert_eq!(status, QueueJobStatus::Claimed);

    let new_lease = reclaimed[0].lease_token.clone().unwrap();
    assert!(complete_workflow_job(&store, &clock, job_id.as_str(), &new_lease).unwrap());
    let status = store.read(|s| s.find_queue_job_by_id(job_id.as_str()).unwrap().status);
    assert_eq!(status, QueueJobStatus::Completed);
}

#[test]
fn fail_requeues_with_backoff_until_attempts_exhausted() {
    let store = MemoryStore::new();
    let clock = FakeClock::new();
    enqueue_workflow_job(&store, &clock, create("req-1")).unwrap();

    for attempt in 1..=3u32 {
        let claimed = claim_one(&store, &clock, "worker-a");
        assert_eq!(claimed.len(), 1, "attempt {attempt} should claim");
        let job = &claimed[0];
        assert_eq!(job.attempt_count, attempt);
        let retry_at = clock.epoch_ms() + 5_000;
        fail_workflow_job(
            &store,
            &clock,
            &FailJob {
                job_id: job.job_id,
                lease_token: job.lease_token.clone().unwrap(),
                error: "INTERNAL_ERROR: boom".to_string(),
                retry_at_ms: Some(retry_at),
            },
        )
        .unwrap();

        let stored = store.read(|s| s.find_queue_job_by_id(job.job_id.as_str()).unwrap().clone());
        if attempt < 3 {
            assert_eq!(stored.status, QueueJobStatus::Queued);
            assert_eq!(stored.available_at_ms, retry_at);
            clock.advance_ms(5_000);
        } else {
            assert_eq!(stored.status, QueueJobStatus::Failed);
            assert_eq!(stored.last_error.as_deref(), Some("INTERNAL_ERROR: boom"));
        }
    }

    clock.advance_ms(60_000);
    assert!(claim_one(&store, &clock, "worker-a").is_empty(), "failed jobs stay failed");
}

#[test]
fn non_retryable_failure_freezes_immediately() {
    let store = MemoryStore::new();
    let clock = FakeClock::new();
    enqueue_workflow_job(&store, &clock, create("req-1")).unwrap();
    let claimed = claim_one(&store, &clock, "worker-a");

    fail_workflow_job(
        &store,
        &clock,
        &FailJob {
            job_id: claimed[0].job_id,
            lease_token: claimed[0].lease_token.clone().unwrap(),
            error: "VALIDATION_ERROR: bad request".to_string(),
            retry_at_ms: None,
        },
    )
    .unwrap();

    let stored = store.read(|s| s.find_queue_job_by_id(claimed[0].job_id.as_str()).unwrap().clone());
    assert_eq!(stored.status, QueueJobStatus::Failed);
    assert_eq!(stored.attempt_count, 1);
}

#[parameterized(
    first = { 1, 5_000 },
    second = { 2, 10_000 },
    third = { 3, 20_000 },
    capped = { 10, 300_000 },
)]
fn exponential_backoff_doubles_to_cap(attempt: u32, expected_ms: u64) {
    let backoff = RetryBackoff::default();
    assert_eq!(backoff.delay_ms(attempt), expected_ms);
}

#[test]
fn fixed_backoff_is_constant() {
    let backoff = RetryBackoff::Fixed { delay_ms: 5_000 };
    assert_eq!(backoff.delay_ms(1), 5_000);
    assert_eq!(backoff.delay_ms(7), 5_000);
}
