// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The external planner seam.
//!
//! The runtime never composes prompts or talks to a model; it consumes a
//! planning function that maps a [`PlannerInputV1`] to a typed intent.

use async_trait::async_trait;
use charter_core::{PlannerInputV1, PlannerIntent};
use std::sync::Arc;
use thiserror::Error;

/// Planner call failures. Provider failures fail the current queue job
/// attempt (retryable); they never commit partial state.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("planner provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    #[error("all planner providers failed")]
    ChainExhausted,
}

/// One planning function.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, input: &PlannerInputV1) -> Result<PlannerIntent, PlannerError>;
}

/// Try-in-order composition over provider/model planners.
///
/// The configured chain (provider API keys plus a model list per provider)
/// is built by the host; the runtime only needs the fallback behavior.
pub struct PlannerChain {
    planners: Vec<Arc<dyn Planner>>,
}

impl PlannerChain {
    pub fn new(planners: Vec<Arc<dyn Planner>>) -> Self {
        Self { planners }
    }
}

#[async_trait]
impl Planner for PlannerChain {
    async fn plan(&self, input: &PlannerInputV1) -> Result<PlannerIntent, PlannerError> {
        for planner in &self.planners {
            match planner.plan(input).await {
                Ok(intent) => return Ok(intent),
                Err(e) => {
                    tracing::warn!(error = %e, "planner provider failed, trying next");
                }
            }
        }
        Err(PlannerError::ChainExhausted)
    }
}

#[cfg(test)]
#[path = "planner_tests.rs"]
mod tests;
