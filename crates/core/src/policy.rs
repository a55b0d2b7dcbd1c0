// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy and approval decision records.
//!
//! The evaluation traits live in the engine crate; these are the durable
//! record shapes the persistence layer stores alongside each step.

use crate::intent::PlannerIntent;
use crate::scope::Scope;
use crate::signal::SignalId;
use crate::workflow::WorkflowId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an approval gate.
    pub struct ApprovalId("apr-");
}

/// Outcome of evaluating a policy pack against an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PolicyOutcome {
    /// Unchanged intent proceeds.
    Allow,
    /// Substituted intent proceeds; both shapes are audited.
    Rewrite { intent: PlannerIntent },
    /// Step terminates failed with no side effect.
    Block { reason: String },
}

impl PolicyOutcome {
    pub fn kind(&self) -> PolicyOutcomeKind {
        match self {
            PolicyOutcome::Allow => PolicyOutcomeKind::Allow,
            PolicyOutcome::Rewrite { .. } => PolicyOutcomeKind::Rewrite,
            PolicyOutcome::Block { .. } => PolicyOutcomeKind::Block,
        }
    }
}

/// Tag-only variant of [`PolicyOutcome`] for records and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyOutcomeKind {
    Allow,
    Rewrite,
    Block,
}

crate::tagged_display! {
    PolicyOutcomeKind {
        Allow => "allow",
        Rewrite => "rewrite",
        Block => "block",
    }
}

/// Risk classification assigned by the approval stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskClass {
    Low,
    Elevated,
    Critical,
}

crate::tagged_display! {
    RiskClass {
        Low => "low",
        Elevated => "elevated",
        Critical => "critical",
    }
}

/// Resolution state of an approval gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

crate::tagged_display! {
    ApprovalStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

/// Durable record of one policy evaluation, attached to a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecisionRecord {
    pub scope: Scope,
    pub workflow_id: WorkflowId,
    pub step_number: u32,
    pub policy_id: String,
    pub policy_version: String,
    pub outcome: PolicyOutcomeKind,
    pub original_intent: PlannerIntent,
    /// Present for `rewrite` outcomes: the intent that actually proceeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_intent: Option<PlannerIntent>,
    /// Block reason, when blocked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_correlation_id: Option<SignalId>,
    pub occurred_at_ms: u64,
}

/// Durable record of one approval resolution, attached to a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecisionRecord {
    pub approval_id: ApprovalId,
    pub scope: Scope,
    pub workflow_id: WorkflowId,
    pub step_number: u32,
    pub risk_class: RiskClass,
    pub reason_code: String,
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_correlation_id: Option<SignalId>,
    pub occurred_at_ms: u64,
}
