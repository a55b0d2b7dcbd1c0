// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tenant-scoped credential resolution.
//!
//! The credential store itself is external; the adapter only sees resolved
//! bundles. Bundles are per-call values and are never cached across
//! tenants.

use async_trait::async_trait;
use charter_core::{Scope, ToolExecutionError};
use std::collections::HashMap;

/// Resolved credentials for one provider under one scope.
#[derive(Debug, Clone)]
pub struct CredentialBundle {
    pub tenant_id: String,
    pub workspace_id: String,
    pub provider: String,
    pub secrets: HashMap<String, String>,
}

impl CredentialBundle {
    /// Whether the bundle belongs to the given scope.
    pub fn matches_scope(&self, scope: &Scope) -> bool {
        scope.matches(&self.tenant_id, &self.workspace_id)
    }
}

/// Resolves a provider's credentials for a tenant scope.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(
        &self,
        scope: &Scope,
        provider: &str,
    ) -> Result<CredentialBundle, ToolExecutionError>;
}

/// Reject a bundle whose scope does not equal the call scope.
pub fn verify_bundle_scope(
    scope: &Scope,
    bundle: &CredentialBundle,
    tool_name: &str,
) -> Result<(), ToolExecutionError> {
    if bundle.matches_scope(scope) {
        Ok(())
    } else {
        Err(ToolExecutionError::validation(
            tool_name,
            format!(
                "credential bundle scope {}/{} does not match call scope {}",
                bundle.tenant_id, bundle.workspace_id, scope
            ),
        ))
    }
}
