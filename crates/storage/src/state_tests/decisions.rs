// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::state::decisions::AuditQuery;
use charter_core::{
    ApprovalDecisionRecord, ApprovalId, ApprovalStatus, AuditEventType, AuditId, AuditRecord,
    PlannerIntent, PolicyDecisionRecord, PolicyOutcomeKind, RequestId, RiskClass,
};

fn policy_decision(step: u32, at: u64) -> PolicyDecisionRecord {
    PolicyDecisionRecord {
        scope: scope(),
        workflow_id: WorkflowId::from_string("wfl-test-1"),
        step_number: step,
        policy_id: "pack-default".to_string(),
        policy_version: "1".to_string(),
        outcome: PolicyOutcomeKind::Allow,
        original_intent: PlannerIntent::Complete { output: None },
        effective_intent: None,
        reason: None,
        signal_correlation_id: None,
        occurred_at_ms: at,
    }
}

fn audit(event_type: AuditEventType, step: Option<u32>, at: u64) -> AuditRecord {
    AuditRecord {
        audit_id: AuditId::new(),
        scope: scope(),
        request_id: RequestId::new("req-1"),
        step_number: step,
        event_type,
        occurred_at_ms: at,
        signal_correlation_id: None,
        detail: json!({}),
    }
}

#[test]
fn policy_decisions_sort_by_step_then_time() {
    let mut state = StoreState::new();
    state.append_policy_decision(policy_decision(1, 50));
    state.append_policy_decision(policy_decision(0, 99));
    state.append_policy_decision(policy_decision(0, 10));

    let rows = state.list_policy_decisions(&scope(), "wfl-test-1");
    let order: Vec<(u32, u64)> = rows.iter().map(|d| (d.step_number, d.occurred_at_ms)).collect();
    assert_eq!(order, vec![(0, 10), (0, 99), (1, 50)]);
}

#[test]
fn approval_decisions_are_scoped() {
    let mut state = StoreState::new();
    state.append_approval_decision(ApprovalDecisionRecord {
        approval_id: ApprovalId::new(),
        scope: other_scope(),
        workflow_id: WorkflowId::from_string("wfl-test-1"),
        step_number: 0,
        risk_class: RiskClass::Elevated,
        reason_code: "external_write".to_string(),
        status: ApprovalStatus::Pending,
        signal_correlation_id: None,
        occurred_at_ms: 5,
    });

    assert!(state.list_approval_decisions(&scope(), "wfl-test-1").is_empty());
    assert_eq!(state.list_approval_decisions(&other_scope(), "wfl-test-1").len(), 1);
}

#[test]
fn audit_query_filters_and_orders() {
    let mut state = StoreState::new();
    state.append_audit_record(audit(AuditEventType::PolicyAllow, Some(0), 10));
    state.append_audit_record(audit(AuditEventType::WorkflowTerminalCompleted, None, 30));
    state.append_audit_record(audit(AuditEventType::PolicyAllow, Some(1), 20));

    let all = state.list_audit_records(&AuditQuery::scoped(scope()));
    let times: Vec<u64> = all.iter().map(|r| r.occurred_at_ms).collect();
    assert_eq!(times, vec![10, 20, 30]);

    let allows = state.list_audit_records(
        &AuditQuery::scoped(scope()).event_type(AuditEventType::PolicyAllow),
    );
    assert_eq!(allows.len(), 2);

    let by_request = state.list_audit_records(&AuditQuery::scoped(scope()).request("req-other"));
    assert!(by_request.is_empty());
}

#[test]
fn audit_query_cross_tenant_requires_flag() {
    let mut state = StoreState::new();
    state.append_audit_record(audit(AuditEventType::PolicyBlock, Some(0), 10));

    let foreign = state.list_audit_records(&AuditQuery::scoped(other_scope()));
    assert!(foreign.is_empty());

    let cross = state.list_audit_records(&AuditQuery {
        access: ReadAccess::CrossTenant,
        request_id: None,
        event_type: None,
    });
    assert_eq!(cross.len(), 1);
}
