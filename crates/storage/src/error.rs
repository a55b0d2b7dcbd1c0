// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error types.

use thiserror::Error;

/// Errors surfaced by the persistence port.
///
/// Every variant maps to `INTERNAL_ERROR` at the component boundary except
/// `ScopeViolation`, which callers translate to `VALIDATION_ERROR`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("scope violation: {0}")]
    ScopeViolation(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("terminal workflow is immutable: {0}")]
    TerminalWorkflow(String),
}
