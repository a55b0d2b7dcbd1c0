// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure type definitions for persisted table rows.

use charter_core::{
    InboxStatus, JobId, RequestId, RunId, Scope, SignalId, SignalType, WorkflowId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a queue job through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueJobStatus {
    Queued,
    Claimed,
    Completed,
    Failed,
}

charter_core::tagged_display! {
    QueueJobStatus {
        Queued => "queued",
        Claimed => "claimed",
        Completed => "completed",
        Failed => "failed",
    }
}

/// A workflow job in the queue.
///
/// Unique on `(tenant_id, workspace_id, request_id)`: the same request
/// enqueued twice maps to one job lineage, which is what makes enqueue
/// idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueJob {
    pub job_id: JobId,
    pub run_id: RunId,
    pub scope: Scope,
    pub workflow_id: WorkflowId,
    pub request_id: RequestId,
    pub thread_id: String,
    pub objective_prompt: String,
    pub status: QueueJobStatus,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub available_at_ms: u64,
    pub created_at_ms: u64,
    /// `"{worker_id}:{uuid_v7}"` while claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_expires_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueueJob {
    /// A job is claimable when available and either queued or holding an
    /// expired lease.
    pub fn is_claimable(&self, now_ms: u64) -> bool {
        if self.available_at_ms > now_ms {
            return false;
        }
        match self.status {
            QueueJobStatus::Queued => true,
            QueueJobStatus::Claimed => {
                self.lease_expires_at_ms.is_some_and(|expiry| expiry <= now_ms)
            }
            QueueJobStatus::Completed | QueueJobStatus::Failed => false,
        }
    }
}

/// Input for enqueueing a workflow job.
#[derive(Debug, Clone)]
pub struct QueueJobCreate {
    pub scope: Scope,
    pub workflow_id: WorkflowId,
    pub request_id: RequestId,
    pub thread_id: String,
    pub objective_prompt: String,
    pub max_attempts: u32,
    /// Defaults to now when absent.
    pub available_at_ms: Option<u64>,
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Success,
    Failed,
}

charter_core::tagged_display! {
    RunStatus {
        Queued => "queued",
        Running => "running",
        Success => "success",
        Failed => "failed",
    }
}

/// Record of one run (a queue-job lineage's execution stream).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub job_id: JobId,
    pub scope: Scope,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Receipt of an inbound provider event.
///
/// Primary key `(provider, provider_team_id, event_id)` prevents duplicate
/// processing of the same external event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessageReceipt {
    pub provider: String,
    pub provider_team_id: String,
    pub event_id: String,
    pub scope: Scope,
    pub received_at_ms: u64,
}

impl InboundMessageReceipt {
    pub fn key(provider: &str, provider_team_id: &str, event_id: &str) -> String {
        format!("{provider}/{provider_team_id}/{event_id}")
    }
}

/// Maps an outbound notification's conversation identity back to the
/// workflow that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMessageThread {
    pub channel_type: String,
    pub channel_id: String,
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_team_id: Option<String>,
    pub scope: Scope,
    pub workflow_id: WorkflowId,
    pub run_id: RunId,
}

impl WorkflowMessageThread {
    pub fn key(channel_type: &str, channel_id: &str, thread_id: &str) -> String {
        format!("{channel_type}/{channel_id}/{thread_id}")
    }
}

/// A signal parked in the inbox until the workflow resumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalInboxEntry {
    pub signal_id: SignalId,
    pub scope: Scope,
    pub workflow_id: WorkflowId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    pub signal_type: SignalType,
    pub payload: Value,
    pub occurred_at_ms: u64,
    pub status: InboxStatus,
}

/// Point-in-time view of a workflow used by replay comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRuntimeSnapshot {
    pub scope: Scope,
    pub workflow_id: WorkflowId,
    pub status: charter_core::WorkflowStatus,
    pub step_count: u32,
    pub captured_at_ms: u64,
}

charter_core::test_builder! {
    pub struct QueueJobBuilder => QueueJob {
        defaults {
            job_id: JobId::from_string("job-test-1"),
            run_id: RunId::from_string("run-test-1"),
            scope: Scope::new("tenant-a", "ws-1"),
            workflow_id: WorkflowId::from_string("wfl-test-1"),
            request_id: RequestId::new("req-1"),
            thread_id: "thread-1".to_string(),
            objective_prompt: "do the thing".to_string(),
            status: QueueJobStatus::Queued,
            attempt_count: 0,
            max_attempts: 3,
            available_at_ms: 1_000_000,
            created_at_ms: 1_000_000,
            lease_token: None,
            lease_expires_at_ms: None,
            last_error: None,
        }
        into {
            workflow_id: WorkflowId,
            request_id: RequestId,
        }
        with {
            status: QueueJobStatus,
        }
    }
}
