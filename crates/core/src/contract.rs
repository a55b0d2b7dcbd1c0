// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Contract validation for every runtime entry point.
//!
//! Validation is all-or-nothing: issues accumulate across fields and a
//! single invalid field rejects the whole payload, before any state
//! mutation. Callers receive every issue in one error.

use crate::intent::PlannerIntent;
use crate::request::{ObjectiveRequestV1, SCHEMA_VERSION_V1};
use crate::signal::{ProviderCallbackV1, WorkflowSignalV1};
use chrono::DateTime;
use thiserror::Error;

/// Rejection carrying every violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("VALIDATION_ERROR: {}", issues.join("; "))]
pub struct ContractError {
    pub issues: Vec<String>,
}

impl ContractError {
    pub fn new(issues: Vec<String>) -> Self {
        Self { issues }
    }

    pub fn single(issue: impl Into<String>) -> Self {
        Self { issues: vec![issue.into()] }
    }
}

fn require(issues: &mut Vec<String>, field: &str, value: &str) {
    if value.trim().is_empty() {
        issues.push(format!("{field} must be a non-empty string"));
    }
}

/// Fields that compose scoped storage keys must not contain the key
/// separator, or two different scopes could join to the same key.
fn require_identifier(issues: &mut Vec<String>, field: &str, value: &str) {
    require(issues, field, value);
    if value.contains('/') {
        issues.push(format!("{field} must not contain '/': {value:?}"));
    }
}

fn check_occurred_at(issues: &mut Vec<String>, value: &str) {
    match DateTime::parse_from_rfc3339(value) {
        Ok(parsed) => {
            // Round-trip: re-serializing and re-parsing must hit the same instant.
            match DateTime::parse_from_rfc3339(&parsed.to_rfc3339()) {
                Ok(reparsed) if reparsed == parsed => {}
                _ => issues.push(format!("occurred_at does not round-trip: {value:?}")),
            }
        }
        Err(e) => issues.push(format!("occurred_at is not ISO-8601 ({e}): {value:?}")),
    }
}

fn finish(issues: Vec<String>) -> Result<(), ContractError> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ContractError::new(issues))
    }
}

/// Epoch milliseconds of a validated ISO-8601 timestamp.
pub fn occurred_at_epoch_ms(value: &str) -> Result<u64, ContractError> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .map_err(|e| ContractError::single(format!("occurred_at is not ISO-8601 ({e}): {value:?}")))?;
    Ok(parsed.timestamp_millis().max(0) as u64)
}

/// Validate an objective request envelope.
pub fn validate_objective_request(request: &ObjectiveRequestV1) -> Result<(), ContractError> {
    let mut issues = Vec::new();
    require_identifier(&mut issues, "request_id", request.request_id.as_str());
    require_identifier(&mut issues, "tenant_id", &request.tenant_id);
    require_identifier(&mut issues, "workspace_id", &request.workspace_id);
    require_identifier(&mut issues, "workflow_id", request.workflow_id.as_str());
    require(&mut issues, "thread_id", &request.thread_id);
    require(&mut issues, "objective_prompt", &request.objective_prompt);
    check_occurred_at(&mut issues, &request.occurred_at);
    if request.schema_version != SCHEMA_VERSION_V1 {
        issues.push(format!(
            "schema_version must be {SCHEMA_VERSION_V1:?}, got {:?}",
            request.schema_version
        ));
    }
    finish(issues)
}

/// Validate a planner intent.
pub fn validate_intent(intent: &PlannerIntent) -> Result<(), ContractError> {
    let mut issues = Vec::new();
    match intent {
        PlannerIntent::ToolCall { tool_name, args } => {
            require(&mut issues, "tool_name", tool_name);
            if !args.is_object() {
                issues.push("tool_call args must be a JSON object".to_string());
            }
        }
        PlannerIntent::AskUser { question } => {
            require(&mut issues, "question", question);
        }
        PlannerIntent::Complete { output } => {
            if let Some(output) = output {
                if !output.is_object() {
                    issues.push("complete output must be a JSON object when present".to_string());
                }
            }
        }
    }
    finish(issues)
}

/// Validate a workflow signal envelope.
pub fn validate_signal(signal: &WorkflowSignalV1) -> Result<(), ContractError> {
    let mut issues = Vec::new();
    require(&mut issues, "signal_id", signal.signal_id.as_str());
    require_identifier(&mut issues, "tenant_id", &signal.tenant_id);
    require_identifier(&mut issues, "workspace_id", &signal.workspace_id);
    require_identifier(&mut issues, "workflow_id", signal.workflow_id.as_str());
    check_occurred_at(&mut issues, &signal.occurred_at);
    finish(issues)
}

/// Validate a provider callback envelope.
///
/// `provider`/`provider_team_id`/`event_id` compose the inbound receipt
/// primary key, so they are identifiers too.
pub fn validate_provider_callback(callback: &ProviderCallbackV1) -> Result<(), ContractError> {
    let mut issues = Vec::new();
    require_identifier(&mut issues, "provider", &callback.provider);
    require_identifier(&mut issues, "provider_team_id", &callback.provider_team_id);
    require_identifier(&mut issues, "event_id", &callback.event_id);
    require_identifier(&mut issues, "tenant_id", &callback.tenant_id);
    require_identifier(&mut issues, "workspace_id", &callback.workspace_id);
    require_identifier(&mut issues, "workflow_id", callback.workflow_id.as_str());
    check_occurred_at(&mut issues, &callback.occurred_at);
    finish(issues)
}

#[cfg(test)]
#[path = "contract_tests.rs"]
mod tests;
