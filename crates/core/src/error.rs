// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime error taxonomy.
//!
//! The taxonomy is a set of wire-stable codes, not Rust types: each crate
//! defines its own `thiserror` enums and maps them onto an [`ErrorCode`]
//! where the code crosses a component boundary (step records, audit detail,
//! queue job `last_error`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire-stable error codes shared across component boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Schema, shape, tenant mismatch, unknown tool, invalid arg.
    /// Always pre-state-mutation; never retried.
    ValidationError,
    /// Policy pack returned `block` for the step's intent.
    PolicyBlocked,
    /// Not a failure: the step is parked waiting for an approval signal.
    ApprovalRequired,
    /// Tool adapter failed after the retry layer gave up.
    ToolFailure,
    /// Persistence or invariant violation; fails the queue job with backoff.
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::PolicyBlocked => "POLICY_BLOCKED",
            ErrorCode::ApprovalRequired => "APPROVAL_REQUIRED",
            ErrorCode::ToolFailure => "TOOL_FAILURE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized tool failure carried out of the adapter layer.
///
/// `code` is a provider-level code (`HTTP_429`, `HTTP_503`, `VALIDATION_ERROR`,
/// provider-specific strings); `retryable` is the adapter's classification
/// after applying the shared rules in the retry layer.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("tool {tool_name} failed: {code}: {message}")]
pub struct ToolExecutionError {
    pub tool_name: String,
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl ToolExecutionError {
    pub fn new(
        tool_name: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Non-retryable validation failure attributed to a tool call.
    pub fn validation(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(tool_name, ErrorCode::ValidationError.as_str(), message, false)
    }
}
