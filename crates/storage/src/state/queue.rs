// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue job table accessors.
//!
//! The claim/complete/fail protocol itself lives in the queue crate and runs
//! inside a store transaction; these are the lookups it and the signal
//! dispatch path share.

use super::types::{QueueJob, QueueJobStatus};
use super::StoreState;
use charter_core::{JobId, Scope};

impl StoreState {
    pub fn queue_job_key(scope: &Scope, request_id: &str) -> String {
        scope.entity_key(request_id)
    }

    pub fn get_queue_job(&self, scope: &Scope, request_id: &str) -> Option<&QueueJob> {
        self.queue_jobs
            .get(&Self::queue_job_key(scope, request_id))
            .filter(|j| &j.scope == scope && j.request_id == request_id)
    }

    pub fn find_queue_job_by_id(&self, job_id: &str) -> Option<&QueueJob> {
        self.queue_jobs.values().find(|j| j.job_id == job_id)
    }

    /// Flip the lineage job for a waiting workflow back to `queued` so a
    /// worker picks it up again. Used by signal dispatch to schedule a
    /// continuation; no-op when the job is currently claimed under a live
    /// lease (the worker holding it will observe the signal on commit).
    pub fn requeue_continuation(
        &mut self,
        scope: &Scope,
        workflow_id: &str,
        now_ms: u64,
    ) -> Option<JobId> {
        let job = self
            .queue_jobs
            .values_mut()
            .find(|j| &j.scope == scope && j.workflow_id == workflow_id)?;
        if job.status == QueueJobStatus::Claimed
            && job.lease_expires_at_ms.is_some_and(|expiry| expiry > now_ms)
        {
            return None;
        }
        job.status = QueueJobStatus::Queued;
        job.available_at_ms = now_ms;
        job.lease_token = None;
        job.lease_expires_at_ms = None;
        Some(job.job_id)
    }
}
