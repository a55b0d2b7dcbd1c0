// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External signals that resume waiting workflows.

use crate::scope::Scope;
use crate::workflow::WorkflowId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;

/// Signal identifier, unique per `(tenant, workspace)` scope.
///
/// Caller-supplied for external events (so redelivery carries the same ID),
/// generated for internally raised signals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalId(pub String);

impl SignalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh time-ordered signal ID.
    pub fn generate() -> Self {
        Self(format!("sig-{}", uuid::Uuid::now_v7()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SignalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SignalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for SignalId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SignalId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for SignalId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Kind of external event delivered to a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Approval,
    ExternalEvent,
    Timer,
    UserInput,
}

crate::tagged_display! {
    SignalType {
        Approval => "approval",
        ExternalEvent => "external_event",
        Timer => "timer",
        UserInput => "user_input",
    }
}

/// Delivery status of a signal record. Acknowledgement is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Received,
    Acknowledged,
}

/// Inbox status: signals land pending and are drained on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxStatus {
    Pending,
    Consumed,
}

/// Versioned signal envelope accepted by the resume path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSignalV1 {
    pub signal_id: SignalId,
    pub tenant_id: String,
    pub workspace_id: String,
    pub workflow_id: WorkflowId,
    pub signal_type: SignalType,
    pub payload: Value,
    /// ISO-8601 timestamp; signals drain in this order within a workflow.
    pub occurred_at: String,
}

impl WorkflowSignalV1 {
    pub fn scope(&self) -> Scope {
        Scope::new(&self.tenant_id, &self.workspace_id)
    }
}

/// Durable record of a delivered signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub signal_id: SignalId,
    pub scope: Scope,
    pub workflow_id: WorkflowId,
    pub signal_type: SignalType,
    pub payload: Value,
    pub occurred_at_ms: u64,
    pub status: SignalStatus,
}

/// Callback from a provider connector (timer service, external webhook).
///
/// Unlike message-thread ingestion, callbacks carry the workflow identity
/// directly; `event_id` feeds the inbound receipt dedup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCallbackV1 {
    pub provider: String,
    pub provider_team_id: String,
    pub event_id: String,
    pub tenant_id: String,
    pub workspace_id: String,
    pub workflow_id: WorkflowId,
    pub signal_type: SignalType,
    pub payload: Value,
    pub occurred_at: String,
}

impl ProviderCallbackV1 {
    pub fn scope(&self) -> Scope {
        Scope::new(&self.tenant_id, &self.workspace_id)
    }
}

crate::test_builder! {
    pub struct WorkflowSignalBuilder => WorkflowSignalV1 {
        defaults {
            signal_id: SignalId::new("sig-test-1"),
            tenant_id: "tenant-a".to_string(),
            workspace_id: "ws-1".to_string(),
            workflow_id: WorkflowId::from_string("wfl-test-1"),
            signal_type: SignalType::UserInput,
            payload: Value::Null,
            occurred_at: "2026-01-10T12:05:00Z".to_string(),
        }
        into {
            tenant_id: String,
            workspace_id: String,
            workflow_id: WorkflowId,
        }
    }
}
