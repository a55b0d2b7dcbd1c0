// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic replay of persisted workflows.
//!
//! A trace is reconstructed from durable state only; replaying it drives a
//! fresh loop with a trace-fed planner, trace-fed tools, and a policy that
//! reproduces recorded blocks. Comparison is structural: step count, step
//! statuses, intent kinds, and tool names.

use crate::context::DefaultContextBuilder;
use crate::error::EngineError;
use crate::planner::{Planner, PlannerError};
use crate::policy::{ApprovalAssessment, ApprovalPolicy, PolicyContext, PolicyPack};
use crate::runtime::{EngineDeps, LoopConfig, PlannerLoop};
use async_trait::async_trait;
use charter_adapters::{
    ActionAdapter, ActionOutcome, CredentialBundle, IdempotencyStore, Tool, ToolCallRequest,
    ToolRegistry,
};
use charter_core::{
    IntentKind, ObjectiveRequestV1, PlannerInputV1, PlannerIntent, PolicyOutcome, ReadAccess,
    RequestId, RiskClass, Scope, SignalId, SignalType, StepStatus, SystemClock,
    ToolExecutionError, WorkflowId, WorkflowSignalV1, WorkflowStatus, SCHEMA_VERSION_V1,
};
use charter_storage::MemoryStore;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// One step as recorded, reduced to what replay needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayStepTrace {
    pub step_number: u32,
    pub intent: IntentKind,
    pub status: StepStatus,
    pub tool_name: Option<String>,
    pub planner_intent: PlannerIntent,
    pub tool_result: Option<Value>,
    pub error_code: Option<String>,
}

/// Deterministic reconstruction of a workflow from persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayTrace {
    pub workflow_id: WorkflowId,
    pub scope: Scope,
    pub request_id: RequestId,
    pub thread_id: String,
    pub objective_prompt: String,
    pub status: WorkflowStatus,
    pub steps: Vec<ReplayStepTrace>,
    pub error_summary: Option<String>,
}

/// Structural summary compared between original and replayed executions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySnapshot {
    pub status: WorkflowStatus,
    pub step_statuses: Vec<StepStatus>,
    pub intents: Vec<IntentKind>,
    pub tool_names: Vec<Option<String>>,
}

impl From<&ReplayTrace> for ReplaySnapshot {
    fn from(trace: &ReplayTrace) -> Self {
        Self {
            status: trace.status,
            step_statuses: trace.steps.iter().map(|s| s.status).collect(),
            intents: trace.steps.iter().map(|s| s.intent).collect(),
            tool_names: trace.steps.iter().map(|s| s.tool_name.clone()).collect(),
        }
    }
}

/// Build a trace from the store. Cross-tenant access must be explicit;
/// this is the one sanctioned use of the flag.
pub fn build_replay_trace(
    store: &MemoryStore,
    workflow_id: &str,
    access: &ReadAccess,
) -> Result<ReplayTrace, EngineError> {
    let workflow = store
        .read(|state| state.find_workflow_by_id(workflow_id, access).cloned())
        .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;

    let request = store.read(|state| {
        state
            .objective_requests
            .values()
            .find(|r| r.workflow_id == workflow.workflow_id && r.scope() == workflow.scope)
            .cloned()
    });

    let steps = workflow
        .steps
        .iter()
        .map(|step| ReplayStepTrace {
            step_number: step.step_number,
            intent: step.intent_kind,
            status: step.status,
            tool_name: step.planner_intent.tool_name().map(str::to_string),
            planner_intent: step.planner_intent.clone(),
            tool_result: step.tool_result.clone(),
            error_code: step.error_code.clone(),
        })
        .collect();

    Ok(ReplayTrace {
        workflow_id: workflow.workflow_id,
        scope: workflow.scope.clone(),
        request_id: request
            .as_ref()
            .map(|r| r.request_id.clone())
            .unwrap_or_else(|| RequestId::new(format!("replay-{workflow_id}"))),
        thread_id: workflow.thread_id.clone(),
        objective_prompt: request
            .map(|r| r.objective_prompt)
            .unwrap_or_else(|| "replay".to_string()),
        status: workflow.status,
        steps,
        error_summary: workflow.error_summary.clone(),
    })
}

/// Re-execute a trace against a fresh store and snapshot the result.
pub async fn replay_trace(trace: &ReplayTrace) -> Result<ReplaySnapshot, EngineError> {
    let store = MemoryStore::new();
    let clock = SystemClock;

    let mut registry = ToolRegistry::new();
    let mut recorded: HashMap<String, Vec<TraceToolCall>> = HashMap::new();
    for step in &trace.steps {
        if let Some(tool_name) = &step.tool_name {
            recorded.entry(tool_name.clone()).or_default().push(TraceToolCall {
                outcome: step.tool_result.clone(),
                failed: step.error_code.as_deref() == Some("TOOL_FAILURE"),
            });
        }
    }
    for (name, calls) in recorded {
        registry
            .register(Arc::new(TraceTool { name, calls: Mutex::new(calls.into()) }))
            .map_err(|e| EngineError::Internal(e.to_string()))?;
    }
    let registry = Arc::new(registry);

    let adapter = Arc::new(ActionAdapter::new(
        registry.clone(),
        Arc::new(IdempotencyStore::new()),
        clock.clone(),
    ));

    let planner = Arc::new(TracePlanner {
        intents: Mutex::new(trace.steps.iter().map(|s| s.planner_intent.clone()).collect()),
    });

    let loop_ = PlannerLoop::new(EngineDeps {
        store,
        registry,
        adapter,
        planner,
        policy: Arc::new(TracePolicy { trace: trace.steps.clone() }),
        approval: Arc::new(TraceApproval { trace: trace.steps.clone() }),
        context: Arc::new(DefaultContextBuilder),
        clock,
        config: LoopConfig {
            max_steps: (trace.steps.len() as u32).max(1),
            ..LoopConfig::default()
        },
    });

    let request = ObjectiveRequestV1 {
        request_id: trace.request_id.clone(),
        tenant_id: trace.scope.tenant_id.clone(),
        workspace_id: trace.scope.workspace_id.clone(),
        workflow_id: trace.workflow_id,
        thread_id: trace.thread_id.clone(),
        occurred_at: "2026-01-01T00:00:00Z".to_string(),
        objective_prompt: trace.objective_prompt.clone(),
        schema_version: SCHEMA_VERSION_V1.to_string(),
    };

    let mut result = loop_.run_request(&request).await?;

    // Steps that originally parked on ask_user and were later resolved
    // resume here the same way they did in production: via a user_input
    // signal. Steps whose recorded state is still parked stay parked.
    let mut resumes = 0usize;
    while result.status == WorkflowStatus::WaitingSignal {
        let parked = result
            .steps
            .iter()
            .rfind(|s| s.status == StepStatus::WaitingSignal)
            .map(|s| s.step_number);
        let Some(parked) = parked else { break };
        let recorded_parked = trace
            .steps
            .get(parked as usize)
            .is_none_or(|s| s.status == StepStatus::WaitingSignal);
        if recorded_parked || resumes >= trace.steps.len() {
            break;
        }
        resumes += 1;
        loop_.resume_with_signal(&WorkflowSignalV1 {
            signal_id: SignalId::new(format!("replay-resume-{parked}")),
            tenant_id: trace.scope.tenant_id.clone(),
            workspace_id: trace.scope.workspace_id.clone(),
            workflow_id: trace.workflow_id,
            signal_type: SignalType::UserInput,
            payload: serde_json::json!({"message": "replayed"}),
            occurred_at: "2026-01-01T00:00:01Z".to_string(),
        })?;
        result = loop_.run_request(&request).await?;
    }

    Ok(ReplaySnapshot {
        status: result.status,
        step_statuses: result.steps.iter().map(|s| s.status).collect(),
        intents: result.steps.iter().map(|s| s.intent_kind).collect(),
        tool_names: result
            .steps
            .iter()
            .map(|s| s.planner_intent.tool_name().map(str::to_string))
            .collect(),
    })
}

/// Compare two snapshots; an empty diff means the replay reproduced the
/// original execution.
pub fn diff_replay_snapshot(original: &ReplaySnapshot, replayed: &ReplaySnapshot) -> Vec<String> {
    let mut diffs = Vec::new();
    if original.status != replayed.status {
        diffs.push(format!("status: {} != {}", original.status, replayed.status));
    }
    if original.step_statuses.len() != replayed.step_statuses.len() {
        diffs.push(format!(
            "step count: {} != {}",
            original.step_statuses.len(),
            replayed.step_statuses.len()
        ));
    }
    for (i, (a, b)) in original.step_statuses.iter().zip(&replayed.step_statuses).enumerate() {
        if a != b {
            diffs.push(format!("step {i} status: {a} != {b}"));
        }
    }
    for (i, (a, b)) in original.intents.iter().zip(&replayed.intents).enumerate() {
        if a != b {
            diffs.push(format!("step {i} intent: {a} != {b}"));
        }
    }
    for (i, (a, b)) in original.tool_names.iter().zip(&replayed.tool_names).enumerate() {
        if a != b {
            diffs.push(format!("step {i} tool: {a:?} != {b:?}"));
        }
    }
    diffs
}

/// Feeds recorded intents back in order.
struct TracePlanner {
    intents: Mutex<VecDeque<PlannerIntent>>,
}

#[async_trait]
impl Planner for TracePlanner {
    async fn plan(&self, _input: &PlannerInputV1) -> Result<PlannerIntent, PlannerError> {
        self.intents.lock().pop_front().ok_or(PlannerError::Provider {
            provider: "trace".to_string(),
            message: "trace exhausted".to_string(),
        })
    }
}

struct TraceToolCall {
    outcome: Option<Value>,
    failed: bool,
}

/// Replays recorded tool results (or recorded failures) in call order.
struct TraceTool {
    name: String,
    calls: Mutex<VecDeque<TraceToolCall>>,
}

#[async_trait]
impl Tool for TraceTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate_args(&self, _args: &Value) -> Result<(), Vec<String>> {
        Ok(())
    }

    async fn execute(
        &self,
        _request: &ToolCallRequest,
        _credentials: Option<&CredentialBundle>,
    ) -> Result<ActionOutcome, ToolExecutionError> {
        let call = self.calls.lock().pop_front();
        match call {
            Some(call) if call.failed => Err(ToolExecutionError::new(
                &self.name,
                "TOOL_FAILURE",
                "recorded failure",
                false,
            )),
            Some(call) => {
                // Recorded results serialize the full ActionOutcome.
                let outcome = call
                    .outcome
                    .and_then(|v| serde_json::from_value::<ActionOutcome>(v).ok());
                Ok(outcome.unwrap_or(ActionOutcome {
                    action_class: "replayed".to_string(),
                    provider: "trace".to_string(),
                    data: Value::Null,
                    external_id: None,
                }))
            }
            None => Err(ToolExecutionError::new(
                &self.name,
                "TOOL_FAILURE",
                "trace exhausted",
                false,
            )),
        }
    }
}

/// Reproduces recorded policy blocks (and approval rejections, which are
/// structurally identical for snapshot purposes).
struct TracePolicy {
    trace: Vec<ReplayStepTrace>,
}

impl PolicyPack for TracePolicy {
    fn policy_id(&self) -> &str {
        "replay-trace"
    }

    fn version(&self) -> &str {
        "1"
    }

    fn evaluate(&self, ctx: &PolicyContext<'_>) -> PolicyOutcome {
        match self.trace.get(ctx.step_index as usize) {
            Some(step)
                if step.status == StepStatus::Failed
                    && matches!(
                        step.error_code.as_deref(),
                        Some("POLICY_BLOCKED") | Some("APPROVAL_REJECTED")
                    ) =>
            {
                PolicyOutcome::Block { reason: "recorded block".to_string() }
            }
            _ => PolicyOutcome::Allow,
        }
    }
}

/// Reproduces recorded approval parks: a step that ended `waiting_signal`
/// on a tool call parks again during replay.
struct TraceApproval {
    trace: Vec<ReplayStepTrace>,
}

impl ApprovalPolicy for TraceApproval {
    fn assess(&self, ctx: &PolicyContext<'_>) -> ApprovalAssessment {
        match self.trace.get(ctx.step_index as usize) {
            Some(step)
                if step.status == StepStatus::WaitingSignal && step.intent == IntentKind::ToolCall =>
            {
                ApprovalAssessment::gated(RiskClass::Elevated, "recorded_approval")
            }
            _ => ApprovalAssessment::auto("replay"),
        }
    }
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
