// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Objective request envelope.

use crate::scope::Scope;
use crate::workflow::WorkflowId;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Schema version accepted by the v1 contract.
pub const SCHEMA_VERSION_V1: &str = "v1";

/// Caller-supplied request identifier, unique per `(tenant, workspace)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    /// Create a new RequestId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string value of this RequestId.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for RequestId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RequestId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for RequestId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Versioned ask to start a workflow under `(tenant, workspace)` scope.
///
/// Immutable once committed: the store rejects re-insertion with different
/// content and treats identical re-insertion as a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveRequestV1 {
    pub request_id: RequestId,
    pub tenant_id: String,
    pub workspace_id: String,
    pub workflow_id: WorkflowId,
    pub thread_id: String,
    /// ISO-8601 timestamp of when the objective was raised.
    pub occurred_at: String,
    pub objective_prompt: String,
    pub schema_version: String,
}

impl ObjectiveRequestV1 {
    pub fn scope(&self) -> Scope {
        Scope::new(&self.tenant_id, &self.workspace_id)
    }
}

crate::test_builder! {
    pub struct ObjectiveRequestBuilder => ObjectiveRequestV1 {
        defaults {
            request_id: RequestId::new("req-1"),
            tenant_id: "tenant-a".to_string(),
            workspace_id: "ws-1".to_string(),
            workflow_id: WorkflowId::from_string("wfl-test-1"),
            thread_id: "thread-1".to_string(),
            occurred_at: "2026-01-10T12:00:00Z".to_string(),
            objective_prompt: "do the thing".to_string(),
            schema_version: SCHEMA_VERSION_V1.to_string(),
        }
        into {
            request_id: RequestId,
            tenant_id: String,
            workspace_id: String,
            workflow_id: WorkflowId,
            thread_id: String,
            occurred_at: String,
            objective_prompt: String,
            schema_version: String,
        }
    }
}
