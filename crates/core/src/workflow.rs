// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow identity and state machine.

use crate::intent::{IntentKind, PlannerInputV1, PlannerIntent, StepSummary};
use crate::policy::{ApprovalId, ApprovalStatus, RiskClass};
use crate::request::RequestId;
use crate::scope::Scope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

crate::define_id! {
    /// Unique identifier for a workflow.
    ///
    /// Supplied by the objective request; one workflow exists per
    /// `workflow_id` within a `(tenant, workspace)` scope.
    pub struct WorkflowId("wfl-");
}

/// Status of the workflow as a whole.
///
/// `Completed` and `Failed` are sinks; `WaitingSignal` may transition back
/// to `Running` on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    WaitingSignal,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }
}

crate::tagged_display! {
    WorkflowStatus {
        Running => "running",
        WaitingSignal => "waiting_signal",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Status of one committed planner step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Tool call executed and its result recorded.
    ToolExecuted,
    /// Parked waiting for an external signal (ask_user or approval).
    WaitingSignal,
    Completed,
    Failed,
}

crate::tagged_display! {
    StepStatus {
        ToolExecuted => "tool_executed",
        WaitingSignal => "waiting_signal",
        Completed => "completed",
        Failed => "failed",
    }
}

/// One trip through the planner loop pipeline, committed atomically with its
/// policy/approval/tool outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerStep {
    pub workflow_id: WorkflowId,
    /// Gap-free, zero-based position within the workflow.
    pub step_number: u32,
    pub intent_kind: IntentKind,
    pub status: StepStatus,
    pub planner_input: PlannerInputV1,
    pub planner_intent: PlannerIntent,
    /// Tool outcome for `tool_call` steps, user reply for resolved `ask_user`
    /// steps, absent otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<Value>,
    /// Error code when `status == Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub created_at_ms: u64,
}

impl PlannerStep {
    /// Condensed view for the next planner call.
    pub fn summary(&self) -> StepSummary {
        let detail = match (&self.planner_intent, &self.error_code) {
            (_, Some(code)) => code.clone(),
            (PlannerIntent::ToolCall { tool_name, .. }, None) => tool_name.clone(),
            (PlannerIntent::AskUser { question }, None) => question.clone(),
            (PlannerIntent::Complete { .. }, None) => "complete".to_string(),
        };
        StepSummary {
            step_number: self.step_number,
            intent: self.intent_kind,
            status: self.status,
            detail,
        }
    }
}

/// Terminal output recorded when a workflow completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    pub completed_at_ms: u64,
}

/// Approval gate parked on a step, resolved by a matching approval signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub approval_id: ApprovalId,
    pub request_id: RequestId,
    pub step_number: u32,
    /// The intent that will execute (unchanged) once approved.
    pub intent: PlannerIntent,
    pub risk_class: RiskClass,
    pub reason_code: String,
    pub requested_at_ms: u64,
    pub status: ApprovalStatus,
}

/// The durable entity that aggregates steps for one objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: WorkflowId,
    pub scope: Scope,
    pub thread_id: String,
    pub status: WorkflowStatus,
    pub steps: Vec<PlannerStep>,
    /// Question shown to the user while parked on an `ask_user` step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<Completion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_approval: Option<PendingApproval>,
    /// Set when `status == Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_summary: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Workflow {
    pub fn new(
        workflow_id: WorkflowId,
        scope: Scope,
        thread_id: impl Into<String>,
        epoch_ms: u64,
    ) -> Self {
        Self {
            workflow_id,
            scope,
            thread_id: thread_id.into(),
            status: WorkflowStatus::Running,
            steps: Vec::new(),
            waiting_question: None,
            completion: None,
            pending_approval: None,
            error_summary: None,
            created_at_ms: epoch_ms,
            updated_at_ms: epoch_ms,
        }
    }

    /// Check if the workflow is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Next step number (steps are gap-free, so this is the current length).
    pub fn next_step_number(&self) -> u32 {
        self.steps.len() as u32
    }

    /// Summaries of all committed steps, oldest first.
    pub fn step_summaries(&self) -> Vec<StepSummary> {
        self.steps.iter().map(PlannerStep::summary).collect()
    }
}

crate::test_builder! {
    pub struct WorkflowBuilder => Workflow {
        defaults {
            workflow_id: WorkflowId::from_string("wfl-test-1"),
            scope: Scope::new("tenant-a", "ws-1"),
            thread_id: "thread-1".to_string(),
            status: WorkflowStatus::Running,
            steps: Vec::new(),
            waiting_question: None,
            completion: None,
            pending_approval: None,
            error_summary: None,
            created_at_ms: 1_000_000,
            updated_at_ms: 1_000_000,
        }
        into {
            workflow_id: WorkflowId,
        }
        with {
            scope: Scope,
        }
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
