// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit trail.

use crate::request::RequestId;
use crate::scope::Scope;
use crate::signal::SignalId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

crate::define_id! {
    /// Unique identifier for an audit record.
    pub struct AuditId("aud-");
}

/// Auditable event classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    PolicyAllow,
    PolicyRewrite,
    PolicyBlock,
    ApprovalPending,
    ApprovalApproved,
    ApprovalRejected,
    WorkflowTerminalCompleted,
    WorkflowTerminalFailed,
}

crate::tagged_display! {
    AuditEventType {
        PolicyAllow => "policy_allow",
        PolicyRewrite => "policy_rewrite",
        PolicyBlock => "policy_block",
        ApprovalPending => "approval_pending",
        ApprovalApproved => "approval_approved",
        ApprovalRejected => "approval_rejected",
        WorkflowTerminalCompleted => "workflow_terminal_completed",
        WorkflowTerminalFailed => "workflow_terminal_failed",
    }
}

/// One audit entry; ordered by `(occurred_at_ms, step_number)` on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: AuditId,
    pub scope: Scope,
    pub request_id: RequestId,
    /// Absent for workflow-level events that are not tied to a step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,
    pub event_type: AuditEventType,
    pub occurred_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_correlation_id: Option<SignalId>,
    pub detail: Value,
}
