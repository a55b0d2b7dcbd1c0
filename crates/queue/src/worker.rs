// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker execute loop.
//!
//! A worker claims jobs, drives each through the planner loop under a
//! wall-clock timeout, and reports completion or failure with backoff.
//! Every exception from the loop is caught here: the job fails with an
//! error event, never the worker.

use crate::error::QueueError;
use crate::jobs::{
    claim_workflow_jobs, complete_workflow_job, fail_workflow_job, ClaimRequest, FailJob,
    RetryBackoff,
};
use charter_core::{Clock, RunEventBody, WorkflowStatus};
use charter_engine::{EngineError, PlannerLoop, RuntimeConfig};
use charter_storage::{MemoryStore, QueueJob, RunEventAppend};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Unique identifier for a worker instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub String);

impl WorkerId {
    /// Create a new WorkerId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string value of this WorkerId.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for WorkerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl Borrow<str> for WorkerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Worker tunables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: WorkerId,
    /// Max jobs claimed per poll.
    pub claim_limit: usize,
    pub lease_ms: u64,
    pub execute_timeout_ms: u64,
    pub backoff: RetryBackoff,
}

impl WorkerConfig {
    pub fn new(worker_id: impl Into<WorkerId>) -> Self {
        Self {
            worker_id: worker_id.into(),
            claim_limit: 4,
            lease_ms: 30_000,
            execute_timeout_ms: 120_000,
            backoff: RetryBackoff::default(),
        }
    }

    /// Derive worker tunables from the environment-resolved config.
    pub fn from_runtime(worker_id: impl Into<WorkerId>, runtime: &RuntimeConfig) -> Self {
        Self {
            worker_id: worker_id.into(),
            claim_limit: 4,
            lease_ms: runtime.lease_ms,
            execute_timeout_ms: runtime.execute_timeout_ms,
            backoff: RetryBackoff::default(),
        }
    }
}

/// Claims and executes workflow jobs against one planner loop.
pub struct Worker<C: Clock> {
    store: MemoryStore,
    planner_loop: Arc<PlannerLoop<C>>,
    clock: C,
    config: WorkerConfig,
}

impl<C: Clock> Worker<C> {
    pub fn new(planner_loop: Arc<PlannerLoop<C>>, clock: C, config: WorkerConfig) -> Self {
        Self { store: planner_loop.store().clone(), planner_loop, clock, config }
    }

    /// One poll: claim available jobs and execute them serially.
    /// Returns the number of jobs claimed.
    pub async fn run_once(&self) -> Result<usize, QueueError> {
        let jobs = claim_workflow_jobs(
            &self.store,
            &self.clock,
            &ClaimRequest {
                worker_id: self.config.worker_id.to_string(),
                limit: self.config.claim_limit,
                lease_ms: self.config.lease_ms,
                tenant_id: None,
                workspace_id: None,
            },
        )?;
        let count = jobs.len();
        for job in jobs {
            self.execute_job(job).await?;
        }
        Ok(count)
    }

    /// Execute one claimed job end to end.
    async fn execute_job(&self, job: QueueJob) -> Result<(), QueueError> {
        let lease_token = job.lease_token.clone().unwrap_or_default();
        let now = self.clock.epoch_ms();

        self.store.with_transaction(|state| {
            state.ensure_run(&job.run_id, &job.job_id, &job.scope);
            state.mark_run_running(job.run_id.as_str(), now)?;
            state.append_run_event(
                RunEventAppend::new(
                    job.run_id,
                    job.scope.clone(),
                    job.request_id.as_str(),
                    now,
                    RunEventBody::RunClaimed {
                        job_id: job.job_id,
                        worker_id: self.config.worker_id.to_string(),
                        attempt: job.attempt_count,
                    },
                )
                .caused_by(job.job_id.as_str()),
            );
            Ok(())
        })?;
        tracing::info!(
            job_id = %job.job_id,
            worker = %self.config.worker_id,
            attempt = job.attempt_count,
            "run claimed by worker"
        );

        let request = self
            .store
            .read(|state| state.get_objective_request(&job.scope, job.request_id.as_str()).cloned());

        let outcome = match request {
            None => Err(EngineError::Internal(format!(
                "objective request {} missing for job {}",
                job.request_id, job.job_id
            ))),
            Some(request) => {
                let timeout = Duration::from_millis(self.config.execute_timeout_ms);
                match tokio::time::timeout(timeout, self.planner_loop.run(&request, &job.run_id))
                    .await
                {
                    Ok(result) => result,
                    // Timeout aborts the attempt; the failure is retryable.
                    Err(_) => Err(EngineError::Internal(format!(
                        "planner loop exceeded {}ms",
                        self.config.execute_timeout_ms
                    ))),
                }
            }
        };

        let finished = self.clock.epoch_ms();
        match outcome {
            Ok(result) => {
                complete_workflow_job(&self.store, &self.clock, job.job_id.as_str(), &lease_token)?;
                self.store.with_transaction(|state| {
                    state.mark_run_success(job.run_id.as_str(), finished)?;
                    let latency_ms = state
                        .runs
                        .get(job.run_id.as_str())
                        .and_then(|r| r.latency_ms)
                        .unwrap_or(0);
                    state.append_run_event(
                        RunEventAppend::new(
                            job.run_id,
                            job.scope.clone(),
                            job.request_id.as_str(),
                            finished,
                            RunEventBody::RunCompleted { job_id: job.job_id, latency_ms },
                        )
                        .caused_by(job.job_id.as_str()),
                    );
                    Ok(())
                })?;
                tracing::info!(
                    job_id = %job.job_id,
                    workflow_status = %result.status,
                    "run completed"
                );

                // A signal that landed while this attempt was finishing could
                // not requeue the lineage (the lease was still live). Catch
                // up here so the continuation is not stranded.
                if result.status == WorkflowStatus::WaitingSignal {
                    self.store.with_transaction(|state| {
                        let has_pending = !state
                            .pending_signal_inbox(&job.scope, job.workflow_id.as_str())
                            .is_empty();
                        if has_pending {
                            state.requeue_continuation(
                                &job.scope,
                                job.workflow_id.as_str(),
                                finished,
                            );
                        }
                        Ok(())
                    })?;
                }
            }
            Err(error) => {
                let retryable = error.is_retryable();
                let exhausted = job.attempt_count >= job.max_attempts;
                let retry_at_ms = (retryable && !exhausted)
                    .then(|| finished + self.config.backoff.delay_ms(job.attempt_count));
                let message = format!("{}: {error}", error.code());

                tracing::warn!(
                    job_id = %job.job_id,
                    attempt = job.attempt_count,
                    retryable,
                    error = %error,
                    "run attempt failed"
                );
                fail_workflow_job(
                    &self.store,
                    &self.clock,
                    &FailJob {
                        job_id: job.job_id,
                        lease_token,
                        error: message.clone(),
                        retry_at_ms,
                    },
                )?;

                let terminal = retry_at_ms.is_none();
                self.store.with_transaction(|state| {
                    if terminal {
                        state.mark_run_failed(job.run_id.as_str(), finished, message.clone())?;
                    }
                    state.append_run_event(
                        RunEventAppend::new(
                            job.run_id,
                            job.scope.clone(),
                            job.request_id.as_str(),
                            finished,
                            RunEventBody::RunFailed {
                                job_id: job.job_id,
                                error: message.clone(),
                                attempt: job.attempt_count,
                                terminal,
                            },
                        )
                        .caused_by(job.job_id.as_str()),
                    );
                    Ok(())
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
