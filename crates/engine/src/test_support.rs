// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted planners, policies, and a loop harness for tests.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use crate::context::DefaultContextBuilder;
use crate::planner::{Planner, PlannerError};
use crate::policy::{
    AllowAllPolicy, ApprovalAssessment, ApprovalPolicy, AutoApprovePolicy, PolicyContext,
    PolicyPack,
};
use crate::runtime::{EngineDeps, LoopConfig, PlannerLoop};
use async_trait::async_trait;
use charter_adapters::test_support::EchoTool;
use charter_adapters::{ActionAdapter, IdempotencyStore, RetryPolicy, Tool, ToolRegistry};
use charter_core::{
    FakeClock, ObjectiveRequestV1, PlannerInputV1, PlannerIntent, PolicyOutcome, RiskClass,
    SCHEMA_VERSION_V1,
};
use charter_storage::MemoryStore;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Planner that pops scripted intents; more can be pushed mid-test to
/// model post-resume planning.
pub struct ScriptedPlanner {
    intents: Mutex<VecDeque<PlannerIntent>>,
    /// Inputs observed by each plan call.
    pub seen_inputs: Mutex<Vec<PlannerInputV1>>,
}

impl ScriptedPlanner {
    pub fn new(intents: Vec<PlannerIntent>) -> Arc<Self> {
        Arc::new(Self {
            intents: Mutex::new(intents.into()),
            seen_inputs: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, intent: PlannerIntent) {
        self.intents.lock().push_back(intent);
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, input: &PlannerInputV1) -> Result<PlannerIntent, PlannerError> {
        self.seen_inputs.lock().push(input.clone());
        self.intents.lock().pop_front().ok_or(PlannerError::Provider {
            provider: "scripted".to_string(),
            message: "script exhausted".to_string(),
        })
    }
}

/// Planner that always fails (for chain and worker-failure tests).
pub struct FailingPlanner;

#[async_trait]
impl Planner for FailingPlanner {
    async fn plan(&self, _input: &PlannerInputV1) -> Result<PlannerIntent, PlannerError> {
        Err(PlannerError::Provider {
            provider: "failing".to_string(),
            message: "model unavailable".to_string(),
        })
    }
}

/// Pack blocking a single tool by name.
pub struct DenyToolPolicy {
    pub tool_name: String,
}

impl PolicyPack for DenyToolPolicy {
    fn policy_id(&self) -> &str {
        "deny-tool"
    }

    fn version(&self) -> &str {
        "1"
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyOutcome {
        if ctx.intent.tool_name() == Some(self.tool_name.as_str()) {
            PolicyOutcome::Block { reason: format!("{} is denied", self.tool_name) }
        } else {
            PolicyOutcome::Allow
        }
    }

    fn constraints(&self) -> Vec<String> {
        vec![format!("must not call {}", self.tool_name)]
    }
}

/// Pack rewriting calls from one tool to another.
pub struct RewriteToolPolicy {
    pub from: String,
    pub to: String,
}

impl PolicyPack for RewriteToolPolicy {
    fn policy_id(&self) -> &str {
        "rewrite-tool"
    }

    fn version(&self) -> &str {
        "1"
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyOutcome {
        match ctx.intent {
            PlannerIntent::ToolCall { tool_name, args } if tool_name == &self.from => {
                PolicyOutcome::Rewrite {
                    intent: PlannerIntent::ToolCall {
                        tool_name: self.to.clone(),
                        args: args.clone(),
                    },
                }
            }
            _ => PolicyOutcome::Allow,
        }
    }
}

/// Approval policy gating one tool by name.
pub struct GateToolApproval {
    pub tool_name: String,
}

impl ApprovalPolicy for GateToolApproval {
    fn assess(&self, ctx: &PolicyContext<'_>) -> ApprovalAssessment {
        if ctx.intent.tool_name() == Some(self.tool_name.as_str()) {
            ApprovalAssessment::gated(RiskClass::Elevated, "external_side_effect")
        } else {
            ApprovalAssessment::auto("low_risk")
        }
    }
}

/// Request with deterministic identifiers derived from the request id.
pub fn test_request(request_id: &str, prompt: &str) -> ObjectiveRequestV1 {
    ObjectiveRequestV1 {
        request_id: request_id.into(),
        tenant_id: "tenant-a".to_string(),
        workspace_id: "ws-1".to_string(),
        workflow_id: format!("wfl-{request_id}").into(),
        thread_id: format!("thread-{request_id}"),
        occurred_at: "2026-01-10T12:00:00Z".to_string(),
        objective_prompt: prompt.to_string(),
        schema_version: SCHEMA_VERSION_V1.to_string(),
    }
}

/// A fully wired loop over fakes.
pub struct LoopHarness {
    pub store: MemoryStore,
    pub clock: FakeClock,
    pub echo: Arc<EchoTool>,
    pub planner: Arc<ScriptedPlanner>,
    pub planner_loop: PlannerLoop<FakeClock>,
}

/// Builder for [`LoopHarness`].
pub struct LoopHarnessBuilder {
    intents: Vec<PlannerIntent>,
    policy: Arc<dyn PolicyPack>,
    approval: Arc<dyn ApprovalPolicy>,
    config: LoopConfig,
    tools: Vec<Arc<dyn Tool>>,
}

impl Default for LoopHarnessBuilder {
    fn default() -> Self {
        Self {
            intents: Vec::new(),
            policy: Arc::new(AllowAllPolicy),
            approval: Arc::new(AutoApprovePolicy),
            config: LoopConfig::default(),
            tools: Vec::new(),
        }
    }
}

impl LoopHarnessBuilder {
    pub fn intents(mut self, intents: Vec<PlannerIntent>) -> Self {
        self.intents = intents;
        self
    }

    pub fn policy(mut self, policy: Arc<dyn PolicyPack>) -> Self {
        self.policy = policy;
        self
    }

    pub fn approval(mut self, approval: Arc<dyn ApprovalPolicy>) -> Self {
        self.approval = approval;
        self
    }

    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn build(self) -> LoopHarness {
        let store = MemoryStore::new();
        let clock = FakeClock::new();
        let echo = EchoTool::new();

        let mut registry = ToolRegistry::new();
        registry.register(echo.clone()).unwrap_or_else(|e| panic!("register echo: {e}"));
        for tool in self.tools {
            let name = tool.name().to_string();
            registry.register(tool).unwrap_or_else(|e| panic!("register {name}: {e}"));
        }
        let registry = Arc::new(registry);

        let adapter = Arc::new(
            ActionAdapter::new(registry.clone(), Arc::new(IdempotencyStore::new()), clock.clone())
                .with_retry(RetryPolicy {
                    max_attempts: 3,
                    base_delay_ms: 1,
                    max_delay_ms: 4,
                    jitter_ratio: 0.0,
                }),
        );

        let planner = ScriptedPlanner::new(self.intents);

        let planner_loop = PlannerLoop::new(EngineDeps {
            store: store.clone(),
            registry,
            adapter,
            planner: planner.clone(),
            policy: self.policy,
            approval: self.approval,
            context: Arc::new(DefaultContextBuilder),
            clock: clock.clone(),
            config: self.config,
        });

        LoopHarness { store, clock, echo, planner, planner_loop }
    }
}

impl LoopHarness {
    pub fn builder() -> LoopHarnessBuilder {
        LoopHarnessBuilder::default()
    }
}
