// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue job protocol: enqueue, claim, complete, fail.
//!
//! Each operation is one store transaction, so the whole-state mutex gives
//! the selection the same effect as `FOR UPDATE SKIP LOCKED`: two workers
//! claiming concurrently never see the same row as claimable.

use crate::error::QueueError;
use charter_core::{Clock, JobId, RunEventBody, RunId};
use charter_storage::{MemoryStore, QueueJob, QueueJobCreate, QueueJobStatus, RunEventAppend, StoreState};

/// Backoff schedule for failed queue jobs.
///
/// Both shapes exist in the wild; which one applies is deployment policy,
/// so it is a parameter rather than a constant.
#[derive(Debug, Clone, Copy)]
pub enum RetryBackoff {
    Fixed { delay_ms: u64 },
    Exponential { base_ms: u64, max_ms: u64 },
}

impl Default for RetryBackoff {
    fn default() -> Self {
        RetryBackoff::Exponential { base_ms: 5_000, max_ms: 300_000 }
    }
}

impl RetryBackoff {
    /// Delay before the next attempt, given the attempt that just failed
    /// (1-based).
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        match self {
            RetryBackoff::Fixed { delay_ms } => *delay_ms,
            RetryBackoff::Exponential { base_ms, max_ms } => {
                let shift = attempt.saturating_sub(1).min(32);
                base_ms.saturating_mul(1u64 << shift).min(*max_ms)
            }
        }
    }
}

/// Claim parameters. `tenant_id`/`workspace_id` narrow the claim to one
/// scope; workers usually claim across scopes.
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub worker_id: String,
    pub limit: usize,
    pub lease_ms: u64,
    pub tenant_id: Option<String>,
    pub workspace_id: Option<String>,
}

/// Failure report for a claimed job.
#[derive(Debug, Clone)]
pub struct FailJob {
    pub job_id: JobId,
    pub lease_token: String,
    pub error: String,
    /// When to retry. `None` marks the job failed immediately (exhausted
    /// attempts or a non-retryable error).
    pub retry_at_ms: Option<u64>,
}

/// Enqueue a workflow job, idempotent on `(tenant, workspace, request_id)`.
///
/// A fresh enqueue assigns the lineage's run identity and emits
/// `run:queued`. Re-enqueueing an existing lineage resets it to `queued`
/// and clears any stale lease, but leaves a live claim alone.
pub fn enqueue_workflow_job<C: Clock>(
    store: &MemoryStore,
    clock: &C,
    input: QueueJobCreate,
) -> Result<QueueJob, QueueError> {
    let now = clock.epoch_ms();
    store.with_transaction(|state| {
        let key = StoreState::queue_job_key(&input.scope, input.request_id.as_str());
        if let Some(existing) = state.queue_jobs.get_mut(&key) {
            let live_lease = existing.status == QueueJobStatus::Claimed
                && existing.lease_expires_at_ms.is_some_and(|expiry| expiry > now);
            if !live_lease {
                existing.status = QueueJobStatus::Queued;
                existing.available_at_ms = input.available_at_ms.unwrap_or(now);
                existing.lease_token = None;
                existing.lease_expires_at_ms = None;
            }
            tracing::debug!(job_id = %existing.job_id, "enqueue hit existing lineage");
            return Ok(existing.clone());
        }

        let job = QueueJob {
            job_id: JobId::new(),
            run_id: RunId::new(),
            scope: input.scope.clone(),
            workflow_id: input.workflow_id,
            request_id: input.request_id.clone(),
            thread_id: input.thread_id.clone(),
            objective_prompt: input.objective_prompt.clone(),
            status: QueueJobStatus::Queued,
            attempt_count: 0,
            max_attempts: input.max_attempts,
            available_at_ms: input.available_at_ms.unwrap_or(now),
            created_at_ms: now,
            lease_token: None,
            lease_expires_at_ms: None,
            last_error: None,
        };
        state.queue_jobs.insert(key, job.clone());
        state.ensure_run(&job.run_id, &job.job_id, &input.scope);
        state.append_run_event(
            RunEventAppend::new(
                job.run_id,
                input.scope.clone(),
                input.request_id.as_str(),
                now,
                RunEventBody::RunQueued {
                    job_id: job.job_id,
                    request_id: input.request_id.clone(),
                    workflow_id: input.workflow_id,
                },
            )
            .caused_by(job.job_id.as_str()),
        );
        tracing::info!(job_id = %job.job_id, run_id = %job.run_id, "workflow job enqueued");
        Ok(job)
    })
    .map_err(QueueError::from)
}

/// Claim up to `limit` available jobs for a worker.
///
/// Selection order is `(available_at, created_at)`; claimed rows get
/// `attempt_count += 1` and a fresh lease `"{worker_id}:{uuid_v7}"`.
pub fn claim_workflow_jobs<C: Clock>(
    store: &MemoryStore,
    clock: &C,
    request: &ClaimRequest,
) -> Result<Vec<QueueJob>, QueueError> {
    let now = clock.epoch_ms();
    store.with_transaction(|state| {
        let mut candidates: Vec<(u64, u64, String)> = state
            .queue_jobs
            .iter()
            .filter(|(_, job)| job.is_claimable(now))
            .filter(|(_, job)| {
                request.tenant_id.as_deref().is_none_or(|t| job.scope.tenant_id == t)
                    && request
                        .workspace_id
                        .as_deref()
                        .is_none_or(|w| job.scope.workspace_id == w)
            })
            .map(|(key, job)| (job.available_at_ms, job.created_at_ms, key.clone()))
            .collect();
        candidates.sort();

        let mut claimed = Vec::new();
        for (_, _, key) in candidates.into_iter().take(request.limit) {
            let Some(job) = state.queue_jobs.get_mut(&key) else { continue };
            job.status = QueueJobStatus::Claimed;
            job.attempt_count += 1;
            job.lease_token = Some(format!("{}:{}", request.worker_id, uuid::Uuid::now_v7()));
            job.lease_expires_at_ms = Some(now + request.lease_ms);
            tracing::debug!(
                job_id = %job.job_id,
                worker = %request.worker_id,
                attempt = job.attempt_count,
                "job claimed"
            );
            claimed.push(job.clone());
        }
        Ok(claimed)
    })
    .map_err(QueueError::from)
}

/// Complete a claimed job. A stale lease is a no-op (`Ok(false)`): the
/// lease has already been reassigned and the new holder owns the job.
pub fn complete_workflow_job<C: Clock>(
    store: &MemoryStore,
    _clock: &C,
    job_id: &str,
    lease_token: &str,
) -> Result<bool, QueueError> {
    store.with_transaction(|state| {
        let Some(job) = state.queue_jobs.values_mut().find(|j| j.job_id == job_id) else {
            return Err(charter_storage::StoreError::NotFound(format!("queue job {job_id}")));
        };
        if job.lease_token.as_deref() != Some(lease_token) {
            tracing::warn!(job_id = %job_id, "complete with stale lease ignored");
            return Ok(false);
        }
        job.status = QueueJobStatus::Completed;
        job.lease_token = None;
        job.lease_expires_at_ms = None;
        Ok(true)
    })
    .map_err(QueueError::from)
}

/// Fail a claimed job: requeue with backoff, or freeze it when attempts
/// are exhausted or the error is not retryable. Stale leases are no-ops.
pub fn fail_workflow_job<C: Clock>(
    store: &MemoryStore,
    _clock: &C,
    input: &FailJob,
) -> Result<bool, QueueError> {
    store.with_transaction(|state| {
        let Some(job) = state.queue_jobs.values_mut().find(|j| j.job_id == input.job_id.as_str())
        else {
            return Err(charter_storage::StoreError::NotFound(format!(
                "queue job {}",
                input.job_id
            )));
        };
        if job.lease_token.as_deref() != Some(input.lease_token.as_str()) {
            tracing::warn!(job_id = %input.job_id, "fail with stale lease ignored");
            return Ok(false);
        }

        job.last_error = Some(input.error.clone());
        job.lease_token = None;
        job.lease_expires_at_ms = None;
        match input.retry_at_ms {
            Some(retry_at) if job.attempt_count < job.max_attempts => {
                job.status = QueueJobStatus::Queued;
                job.available_at_ms = retry_at;
                tracing::info!(
                    job_id = %input.job_id,
                    attempt = job.attempt_count,
                    retry_at_ms = retry_at,
                    "job failed, retrying with backoff"
                );
            }
            _ => {
                // Terminal: availableAt is frozen as-is.
                job.status = QueueJobStatus::Failed;
                tracing::warn!(job_id = %input.job_id, error = %input.error, "job failed terminally");
            }
        }
        Ok(true)
    })
    .map_err(QueueError::from)
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
