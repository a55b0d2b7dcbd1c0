// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake tools and resolvers for tests.

use crate::credentials::{CredentialBundle, CredentialResolver};
use crate::registry::{ActionOutcome, Tool, ToolCallRequest};
use async_trait::async_trait;
use charter_core::{Scope, ToolExecutionError};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Echoes its arguments back. Counts invocations.
pub struct EchoTool {
    calls: Mutex<u32>,
}

impl EchoTool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(0) })
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn validate_args(&self, args: &serde_json::Value) -> Result<(), Vec<String>> {
        if args.is_object() {
            Ok(())
        } else {
            Err(vec!["args must be an object".to_string()])
        }
    }

    async fn execute(
        &self,
        request: &ToolCallRequest,
        _credentials: Option<&CredentialBundle>,
    ) -> Result<ActionOutcome, ToolExecutionError> {
        *self.calls.lock() += 1;
        Ok(ActionOutcome {
            action_class: "echoed".to_string(),
            provider: "fake".to_string(),
            data: request.args.clone(),
            external_id: None,
        })
    }
}

/// Fails the first `failures` calls with the given code, then succeeds.
pub struct FlakyTool {
    name: String,
    code: String,
    failures: u32,
    calls: Mutex<u32>,
}

impl FlakyTool {
    pub fn new(name: impl Into<String>, code: impl Into<String>, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            code: code.into(),
            failures,
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl Tool for FlakyTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate_args(&self, _args: &serde_json::Value) -> Result<(), Vec<String>> {
        Ok(())
    }

    async fn execute(
        &self,
        request: &ToolCallRequest,
        _credentials: Option<&CredentialBundle>,
    ) -> Result<ActionOutcome, ToolExecutionError> {
        let mut calls = self.calls.lock();
        *calls += 1;
        if *calls <= self.failures {
            return Err(ToolExecutionError::new(
                &self.name,
                &self.code,
                "provider unavailable",
                false,
            ));
        }
        Ok(ActionOutcome {
            action_class: "flaky_done".to_string(),
            provider: "fake".to_string(),
            data: request.args.clone(),
            external_id: Some(format!("ext-{}", *calls)),
        })
    }
}

/// Always fails with a non-retryable error.
pub struct BrokenTool {
    name: String,
}

impl BrokenTool {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into() })
    }
}

#[async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate_args(&self, _args: &serde_json::Value) -> Result<(), Vec<String>> {
        Ok(())
    }

    async fn execute(
        &self,
        _request: &ToolCallRequest,
        _credentials: Option<&CredentialBundle>,
    ) -> Result<ActionOutcome, ToolExecutionError> {
        Err(ToolExecutionError::new(&self.name, "PROVIDER_REJECTED", "hard failure", false))
    }
}

/// Tool restricted to a single tenant; requires provider credentials.
pub struct TenantLockedTool {
    name: String,
    provider: String,
    tenant_id: String,
    /// Provider token observed on the last successful call.
    pub seen_token: Mutex<Option<String>>,
}

impl TenantLockedTool {
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            provider: provider.into(),
            tenant_id: tenant_id.into(),
            seen_token: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Tool for TenantLockedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> Option<&str> {
        Some(&self.provider)
    }

    fn validate_args(&self, _args: &serde_json::Value) -> Result<(), Vec<String>> {
        Ok(())
    }

    fn is_authorized(&self, scope: &Scope) -> bool {
        scope.tenant_id == self.tenant_id
    }

    async fn execute(
        &self,
        _request: &ToolCallRequest,
        credentials: Option<&CredentialBundle>,
    ) -> Result<ActionOutcome, ToolExecutionError> {
        let bundle = credentials.ok_or_else(|| {
            ToolExecutionError::new(&self.name, "MISSING_CREDENTIALS", "no bundle resolved", false)
        })?;
        *self.seen_token.lock() = bundle.secrets.get("token").cloned();
        Ok(ActionOutcome {
            action_class: "provider_call".to_string(),
            provider: self.provider.clone(),
            data: json!({"ok": true}),
            external_id: None,
        })
    }
}

/// Resolver returning a fixed token, scoped to whatever it is asked for.
pub struct StaticCredentialResolver {
    pub token: String,
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(
        &self,
        scope: &Scope,
        provider: &str,
    ) -> Result<CredentialBundle, ToolExecutionError> {
        let mut secrets = HashMap::new();
        secrets.insert("token".to_string(), self.token.clone());
        Ok(CredentialBundle {
            tenant_id: scope.tenant_id.clone(),
            workspace_id: scope.workspace_id.clone(),
            provider: provider.to_string(),
            secrets,
        })
    }
}

/// Resolver that returns a bundle for the wrong tenant (scope-mismatch path).
pub struct MisscopedCredentialResolver;

#[async_trait]
impl CredentialResolver for MisscopedCredentialResolver {
    async fn resolve(
        &self,
        _scope: &Scope,
        provider: &str,
    ) -> Result<CredentialBundle, ToolExecutionError> {
        Ok(CredentialBundle {
            tenant_id: "someone-else".to_string(),
            workspace_id: "other-ws".to_string(),
            provider: provider.to_string(),
            secrets: HashMap::new(),
        })
    }
}
