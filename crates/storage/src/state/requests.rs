// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Objective request table.

use super::StoreState;
use crate::error::StoreError;
use charter_core::ObjectiveRequestV1;

impl StoreState {
    /// Commit an objective request. Requests are immutable: re-inserting an
    /// identical envelope is a no-op (`Ok(false)`), re-inserting different
    /// content under the same `(tenant, workspace, request_id)` is a conflict.
    pub fn insert_objective_request(
        &mut self,
        request: &ObjectiveRequestV1,
    ) -> Result<bool, StoreError> {
        let key = request.scope().entity_key(request.request_id.as_str());
        match self.objective_requests.get(&key) {
            Some(existing) if existing == request => Ok(false),
            Some(_) => Err(StoreError::Conflict(format!(
                "objective request {} already committed with different content",
                request.request_id
            ))),
            None => {
                self.objective_requests.insert(key, request.clone());
                Ok(true)
            }
        }
    }

    pub fn get_objective_request(
        &self,
        scope: &charter_core::Scope,
        request_id: &str,
    ) -> Option<&ObjectiveRequestV1> {
        self.objective_requests
            .get(&scope.entity_key(request_id))
            .filter(|r| scope.matches(&r.tenant_id, &r.workspace_id) && r.request_id == request_id)
    }

    /// All requests in a tenant scope, ordered by `(occurred_at, request_id)`.
    pub fn list_objective_requests(
        &self,
        tenant_id: &str,
        workspace_id: &str,
    ) -> Vec<&ObjectiveRequestV1> {
        let mut rows: Vec<&ObjectiveRequestV1> = self
            .objective_requests
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.workspace_id == workspace_id)
            .collect();
        rows.sort_by(|a, b| {
            (a.occurred_at.as_str(), a.request_id.as_str())
                .cmp(&(b.occurred_at.as_str(), b.request_id.as_str()))
        });
        rows
    }
}
