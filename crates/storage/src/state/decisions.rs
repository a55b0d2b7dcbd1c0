// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy, approval, and audit tables.

use super::StoreState;
use charter_core::{
    ApprovalDecisionRecord, AuditEventType, AuditRecord, PolicyDecisionRecord, ReadAccess,
    RequestId, Scope,
};

/// Filter for audit reads. `access` is the only mandatory part.
#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub access: ReadAccess,
    pub request_id: Option<RequestId>,
    pub event_type: Option<AuditEventType>,
}

impl AuditQuery {
    pub fn scoped(scope: Scope) -> Self {
        Self { access: ReadAccess::Scoped(scope), request_id: None, event_type: None }
    }

    pub fn request(mut self, request_id: impl Into<RequestId>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn event_type(mut self, event_type: AuditEventType) -> Self {
        self.event_type = Some(event_type);
        self
    }
}

impl StoreState {
    pub fn append_policy_decision(&mut self, record: PolicyDecisionRecord) {
        self.policy_decisions.push(record);
    }

    pub fn append_approval_decision(&mut self, record: ApprovalDecisionRecord) {
        self.approval_decisions.push(record);
    }

    pub fn append_audit_record(&mut self, record: AuditRecord) {
        self.audit_records.push(record);
    }

    /// Policy decisions for a workflow, ordered by `(step_number, occurred_at)`.
    pub fn list_policy_decisions(
        &self,
        scope: &Scope,
        workflow_id: &str,
    ) -> Vec<&PolicyDecisionRecord> {
        let mut rows: Vec<&PolicyDecisionRecord> = self
            .policy_decisions
            .iter()
            .filter(|d| &d.scope == scope && d.workflow_id == workflow_id)
            .collect();
        rows.sort_by_key(|d| (d.step_number, d.occurred_at_ms));
        rows
    }

    /// Approval decisions for a workflow, ordered by `(step_number, occurred_at)`.
    pub fn list_approval_decisions(
        &self,
        scope: &Scope,
        workflow_id: &str,
    ) -> Vec<&ApprovalDecisionRecord> {
        let mut rows: Vec<&ApprovalDecisionRecord> = self
            .approval_decisions
            .iter()
            .filter(|d| &d.scope == scope && d.workflow_id == workflow_id)
            .collect();
        rows.sort_by_key(|d| (d.step_number, d.occurred_at_ms));
        rows
    }

    /// Audit records matching a query, ordered by `(occurred_at, step_number)`.
    pub fn list_audit_records(&self, query: &AuditQuery) -> Vec<&AuditRecord> {
        let mut rows: Vec<&AuditRecord> = self
            .audit_records
            .iter()
            .filter(|r| query.access.permits(&r.scope))
            .filter(|r| {
                query
                    .request_id
                    .as_ref()
                    .is_none_or(|id| &r.request_id == id)
            })
            .filter(|r| query.event_type.is_none_or(|t| r.event_type == t))
            .collect();
        rows.sort_by_key(|r| (r.occurred_at_ms, r.step_number.unwrap_or(u32::MAX)));
        rows
    }
}
