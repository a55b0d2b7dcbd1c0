// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! charter-engine: The planner-first decision loop.
//!
//! One [`PlannerLoop`] drives a workflow through the stage pipeline
//! (build context → plan → validate → policy → approval → execute →
//! commit) until it parks or terminates, and resumes it when signals
//! arrive. Every step commits through the persistence port in a single
//! transaction together with its policy, approval, audit, and run-event
//! records.

pub mod config;
pub mod context;
pub mod error;
pub mod planner;
pub mod policy;
pub mod replay;
pub mod runtime;
pub mod signals;
pub mod telemetry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::RuntimeConfig;
pub use context::{ContextArgs, ContextBuilder, DefaultContextBuilder};
pub use error::EngineError;
pub use planner::{Planner, PlannerChain, PlannerError};
pub use policy::{
    AllowAllPolicy, ApprovalAssessment, ApprovalPolicy, AutoApprovePolicy, PolicyContext,
    PolicyPack,
};
pub use replay::{
    build_replay_trace, diff_replay_snapshot, replay_trace, ReplaySnapshot, ReplayStepTrace,
    ReplayTrace,
};
pub use runtime::{EngineDeps, LoopConfig, PlannerLoop, PlannerLoopResult};
pub use signals::{InboundMessage, ResumeAck};
pub use telemetry::Telemetry;
