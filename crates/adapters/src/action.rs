// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composed action adapter: credentials → idempotency → retry → tool.

use crate::credentials::{verify_bundle_scope, CredentialResolver};
use crate::idempotency::{FailureRecord, IdempotencyKey, IdempotencyRecord, IdempotencyStore, TerminalReason};
use crate::registry::{ActionOutcome, ToolCallRequest, ToolRegistry};
use crate::retry::{is_retryable, RetryPolicy};
use charter_core::{Clock, RequestId, Scope, ToolExecutionError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One side-effecting call, addressed by its durable identity.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub scope: Scope,
    pub request_id: RequestId,
    pub step_number: u32,
    pub tool_name: String,
    pub args: Value,
}

/// Wraps the registry with credential resolution, idempotency dedup, and
/// bounded retry. This is the only path through which the planner loop
/// executes tools.
pub struct ActionAdapter<C: Clock> {
    registry: Arc<ToolRegistry>,
    credentials: Option<Arc<dyn CredentialResolver>>,
    idempotency: Arc<IdempotencyStore>,
    retry: RetryPolicy,
    cancel: CancellationToken,
    clock: C,
}

impl<C: Clock> ActionAdapter<C> {
    pub fn new(registry: Arc<ToolRegistry>, idempotency: Arc<IdempotencyStore>, clock: C) -> Self {
        Self {
            registry,
            credentials: None,
            idempotency,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
            clock,
        }
    }

    pub fn with_credentials(mut self, resolver: Arc<dyn CredentialResolver>) -> Self {
        self.credentials = Some(resolver);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn idempotency(&self) -> &IdempotencyStore {
        &self.idempotency
    }

    /// Execute one action at most once per idempotency key.
    pub async fn execute(&self, request: &ActionRequest) -> Result<ActionOutcome, ToolExecutionError> {
        let key = IdempotencyKey::derive(
            &request.scope.tenant_id,
            request.request_id.as_str(),
            request.step_number,
            &request.tool_name,
            &request.args,
        );

        // Serialize concurrent callers under the same key; the loser of the
        // race observes the winner's record instead of re-executing.
        let gate = self.idempotency.gate(&key.key);
        let _guard = gate.lock().await;

        if let Some(record) = self.idempotency.get(&key.key) {
            if record.fingerprint != key.fingerprint {
                return Err(ToolExecutionError::validation(
                    &request.tool_name,
                    "idempotency key collision: fingerprint mismatch",
                ));
            }
            tracing::debug!(
                tool = %request.tool_name,
                step = request.step_number,
                "idempotent replay, returning recorded result"
            );
            return Ok(record.outcome);
        }

        let call = ToolCallRequest {
            scope: request.scope.clone(),
            tool_name: request.tool_name.clone(),
            args: request.args.clone(),
        };

        let provider = self
            .registry
            .get(&request.tool_name)
            .and_then(|t| t.provider().map(str::to_string));
        let credentials = match (&self.credentials, provider) {
            (Some(resolver), Some(provider)) => {
                let bundle = resolver.resolve(&request.scope, &provider).await?;
                verify_bundle_scope(&request.scope, &bundle, &request.tool_name)?;
                Some(bundle)
            }
            _ => None,
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.registry.execute(&call, credentials.as_ref()).await {
                Ok(outcome) => {
                    self.idempotency.put(
                        &key.key,
                        IdempotencyRecord {
                            fingerprint: key.fingerprint.clone(),
                            outcome: outcome.clone(),
                            recorded_at_ms: self.clock.epoch_ms(),
                        },
                    );
                    return Ok(outcome);
                }
                Err(mut error) => {
                    let retryable = is_retryable(&error);
                    error.retryable = retryable;

                    if !retryable {
                        self.record_failure(&key.key, TerminalReason::NonRetryable, &error, attempt);
                        return Err(error);
                    }
                    if attempt >= self.retry.max_attempts {
                        self.record_failure(
                            &key.key,
                            TerminalReason::MaxAttemptsExhausted,
                            &error,
                            attempt,
                        );
                        return Err(error);
                    }

                    let delay = self.retry.jittered_delay_ms(attempt);
                    tracing::debug!(
                        tool = %request.tool_name,
                        attempt,
                        delay_ms = delay,
                        error = %error,
                        "retrying tool call"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                        _ = self.cancel.cancelled() => {
                            return Err(ToolExecutionError::new(
                                &request.tool_name,
                                "CANCELLED",
                                "retry cancelled by shutdown",
                                true,
                            ));
                        }
                    }
                }
            }
        }
    }

    fn record_failure(
        &self,
        key: &str,
        reason: TerminalReason,
        error: &ToolExecutionError,
        attempts: u32,
    ) {
        tracing::warn!(key = charter_core::short(key, 12), reason = %reason, error = %error, "tool call terminal failure");
        self.idempotency.record_failure(
            key,
            FailureRecord {
                reason,
                last_error_code: error.code.clone(),
                last_error_message: error.message.clone(),
                last_attempt_at_ms: self.clock.epoch_ms(),
                attempts,
            },
        );
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
