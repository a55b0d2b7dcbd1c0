// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! charter-adapters: Tool registry and the action adapter layer.
//!
//! A raw [`Tool`] knows how to validate its arguments and talk to a
//! provider. The [`ActionAdapter`] wraps execution with three composable
//! layers: tenant credential resolution, idempotency dedup, and retry with
//! jitter backoff. Each layer is optional; the composition is what the
//! planner loop calls.

pub mod action;
pub mod credentials;
pub mod idempotency;
pub mod registry;
pub mod retry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use action::{ActionAdapter, ActionRequest};
pub use credentials::{verify_bundle_scope, CredentialBundle, CredentialResolver};
pub use idempotency::{
    FailureRecord, IdempotencyKey, IdempotencyRecord, IdempotencyStore, TerminalReason,
};
pub use registry::{ActionOutcome, RegistryError, Tool, ToolCallRequest, ToolRegistry};
pub use retry::RetryPolicy;
