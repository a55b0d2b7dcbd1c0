// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Planner intents and planner input.
//!
//! The planner is an external function; the runtime only understands the
//! three control-flow primitives below. Intents are a tagged union with
//! exhaustive matching — adding a variant is a breaking change by design.

use crate::scope::Scope;
use crate::workflow::StepStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decision returned by one planner call.
///
/// Serializes with `{"type": "tool_call" | "ask_user" | "complete", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlannerIntent {
    #[serde(rename = "tool_call")]
    ToolCall {
        tool_name: String,
        /// Tool arguments; must be a JSON object.
        args: Value,
    },

    #[serde(rename = "ask_user")]
    AskUser { question: String },

    #[serde(rename = "complete")]
    Complete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
    },
}

impl PlannerIntent {
    pub fn kind(&self) -> IntentKind {
        match self {
            PlannerIntent::ToolCall { .. } => IntentKind::ToolCall,
            PlannerIntent::AskUser { .. } => IntentKind::AskUser,
            PlannerIntent::Complete { .. } => IntentKind::Complete,
        }
    }

    /// Tool name for `tool_call` intents.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            PlannerIntent::ToolCall { tool_name, .. } => Some(tool_name),
            _ => None,
        }
    }
}

/// Tag-only variant of [`PlannerIntent`] for records and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    ToolCall,
    AskUser,
    Complete,
}

crate::tagged_display! {
    IntentKind {
        ToolCall => "tool_call",
        AskUser => "ask_user",
        Complete => "complete",
    }
}

/// Condensed view of an earlier step, fed back to the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSummary {
    pub step_number: u32,
    pub intent: IntentKind,
    pub status: StepStatus,
    /// Short human-readable description of what the step did or why it
    /// stopped (tool name, question text, error code).
    pub detail: String,
}

/// Composed planning context handed to the external planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerInputV1 {
    pub objective_prompt: String,
    /// Recent durable context (tool outputs, consumed signals), oldest first,
    /// capped by the long-term memory limit.
    pub memory_context: Vec<String>,
    pub prior_step_summaries: Vec<StepSummary>,
    /// Constraints advertised by the active policy pack.
    pub policy_constraints: Vec<String>,
    /// Tools the planner is allowed to call under this scope.
    pub available_tools: Vec<String>,
    pub step_index: u32,
    pub scope: Scope,
}

#[cfg(test)]
#[path = "intent_tests.rs"]
mod tests;
