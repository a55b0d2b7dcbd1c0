// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use crate::planner::PlannerError;
use charter_core::{ContractError, ErrorCode};
use charter_storage::StoreError;
use thiserror::Error;

/// Errors surfaced by the planner loop and resume paths.
///
/// Recoverable conditions (tool retry, policy rewrite, approval parking)
/// are absorbed inside the loop; what escapes here fails the queue job.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Taxonomy code for records and queue job errors.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Contract(_) | EngineError::WorkflowNotFound(_) => {
                ErrorCode::ValidationError
            }
            EngineError::Planner(_) | EngineError::Store(_) | EngineError::Internal(_) => {
                ErrorCode::InternalError
            }
        }
    }

    /// Whether a queue job hitting this error should be retried.
    pub fn is_retryable(&self) -> bool {
        self.code() == ErrorCode::InternalError
    }
}
