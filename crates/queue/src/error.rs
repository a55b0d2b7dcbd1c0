// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue error types.

use charter_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("queue job not found: {0}")]
    JobNotFound(String),
}
