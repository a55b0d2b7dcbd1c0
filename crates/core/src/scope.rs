// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tenant/workspace isolation scope.
//!
//! Every entity in the runtime carries a `(tenant_id, workspace_id)` pair and
//! every read or mutation is filtered by it. The only way around the boundary
//! is [`ReadAccess::CrossTenant`], reserved for replay tooling.

use serde::{Deserialize, Serialize};

/// Two-level isolation key applied to every read and write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub tenant_id: String,
    pub workspace_id: String,
}

impl Scope {
    pub fn new(tenant_id: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self { tenant_id: tenant_id.into(), workspace_id: workspace_id.into() }
    }

    /// Stable composite key for scoped map lookups: `tenant/workspace`.
    ///
    /// The contract validator rejects `/` in every field that lands in a
    /// composite key, so two distinct scopes cannot join to the same key.
    /// Scoped getters in the store still re-check the stored scope against
    /// the caller's, so a record written through a side door cannot be read
    /// across the boundary either.
    pub fn key(&self) -> String {
        format!("{}/{}", self.tenant_id, self.workspace_id)
    }

    /// Composite key for an entity within this scope: `tenant/workspace/id`.
    pub fn entity_key(&self, id: &str) -> String {
        format!("{}/{}/{}", self.tenant_id, self.workspace_id, id)
    }

    /// Check whether a raw tenant/workspace pair matches this scope.
    pub fn matches(&self, tenant_id: &str, workspace_id: &str) -> bool {
        self.tenant_id == tenant_id && self.workspace_id == workspace_id
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.workspace_id)
    }
}

/// Access qualifier for reads that can cross the tenant boundary.
///
/// `Scoped` is the default everywhere; `CrossTenant` must be requested
/// explicitly and exists only for replay tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadAccess {
    Scoped(Scope),
    CrossTenant,
}

impl ReadAccess {
    /// Whether an entity in `scope` is visible under this access.
    pub fn permits(&self, scope: &Scope) -> bool {
        match self {
            ReadAccess::Scoped(own) => own == scope,
            ReadAccess::CrossTenant => true,
        }
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
