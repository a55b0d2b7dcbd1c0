// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool registry: name → definition mapping with tenant-scoped
//! authorization, argument validation, and execute dispatch.

use crate::credentials::CredentialBundle;
use async_trait::async_trait;
use charter_core::{Scope, ToolExecutionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Registration failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool name must be non-empty")]
    EmptyName,

    #[error("tool {0:?} is already registered")]
    DuplicateName(String),
}

/// One tool invocation as seen by the registry.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub scope: Scope,
    pub tool_name: String,
    pub args: Value,
}

/// Successful adapter result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Provider-agnostic class of the action ("message_posted",
    /// "event_created", ...). Domain semantics live in the tool.
    pub action_class: String,
    pub provider: String,
    pub data: Value,
    /// Provider-side identifier of the created resource, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

/// A named, schema-validated capability.
///
/// The trait makes argument validation and execution mandatory at the type
/// level; authorization defaults to "any scope".
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Provider whose credentials this tool needs, when any. Returning
    /// `Some` makes the adapter resolve a tenant-scoped bundle before
    /// execution.
    fn provider(&self) -> Option<&str> {
        None
    }

    /// Validate arguments, returning every issue found.
    fn validate_args(&self, args: &Value) -> Result<(), Vec<String>>;

    fn is_authorized(&self, _scope: &Scope) -> bool {
        true
    }

    async fn execute(
        &self,
        request: &ToolCallRequest,
        credentials: Option<&CredentialBundle>,
    ) -> Result<ActionOutcome, ToolExecutionError>;
}

/// Name → tool map. Names are unique; lookups are scope-filtered.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Names of the tools authorized for a scope, sorted.
    pub fn list_tools(&self, scope: &Scope) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .values()
            .filter(|t| t.is_authorized(scope))
            .map(|t| t.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Dispatch one call: authorization, then argument validation (all
    /// issues joined into a single validation error), then the handler.
    pub async fn execute(
        &self,
        request: &ToolCallRequest,
        credentials: Option<&CredentialBundle>,
    ) -> Result<ActionOutcome, ToolExecutionError> {
        let tool = self.get(&request.tool_name).ok_or_else(|| {
            ToolExecutionError::validation(
                &request.tool_name,
                format!("unknown tool {:?}", request.tool_name),
            )
        })?;

        if !tool.is_authorized(&request.scope) {
            return Err(ToolExecutionError::validation(
                &request.tool_name,
                format!("tool {:?} is not authorized for scope {}", request.tool_name, request.scope),
            ));
        }

        if let Err(issues) = tool.validate_args(&request.args) {
            return Err(ToolExecutionError::validation(
                &request.tool_name,
                format!("invalid args: {}", issues.join("; ")),
            ));
        }

        tool.execute(request, credentials).await
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
