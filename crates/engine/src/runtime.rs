// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The planner loop: stage pipeline and step commit.

use crate::context::{ContextArgs, ContextBuilder};
use crate::error::EngineError;
use crate::planner::Planner;
use crate::policy::{ApprovalPolicy, PolicyContext, PolicyPack};
use crate::telemetry::Telemetry;
use charter_adapters::{ActionAdapter, ActionRequest, ToolRegistry};
use charter_core::{
    validate_intent, validate_objective_request, ApprovalDecisionRecord, ApprovalId,
    ApprovalStatus, AuditEventType, AuditId, AuditRecord, Clock, Completion, ErrorCode, JobId,
    ObjectiveRequestV1, PendingApproval, PlannerInputV1, PlannerIntent, PlannerStep,
    PolicyDecisionRecord, PolicyOutcome, RunEventBody, RunId, SignalId, SignalRecord, StepStatus,
    Workflow, WorkflowId, WorkflowStatus,
};
use charter_storage::MemoryStore;
use serde_json::json;
use std::sync::Arc;

/// The error summary recorded when a workflow exhausts its step budget.
pub const MAX_STEPS_EXHAUSTED: &str = "max steps exhausted";

/// Loop tunables.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// `SHORT_TERM_STEP_LIMIT`: exceeding it terminates the workflow failed.
    pub max_steps: u32,
    /// `LONG_TERM_MEMORY_LIMIT`: cap on memory-context entries.
    pub memory_limit: usize,
    /// When true a policy block terminates the whole workflow; the default
    /// terminates only the step and lets the planner continue.
    pub fail_workflow_on_block: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self { max_steps: 16, memory_limit: 64, fail_workflow_on_block: false }
    }
}

/// Everything the loop needs, injected.
pub struct EngineDeps<C: Clock> {
    pub store: MemoryStore,
    pub registry: Arc<ToolRegistry>,
    pub adapter: Arc<ActionAdapter<C>>,
    pub planner: Arc<dyn Planner>,
    pub policy: Arc<dyn PolicyPack>,
    pub approval: Arc<dyn ApprovalPolicy>,
    pub context: Arc<dyn ContextBuilder>,
    pub clock: C,
    pub config: LoopConfig,
}

/// Control-plane view of a workflow after a loop invocation.
#[derive(Debug, Clone)]
pub struct PlannerLoopResult {
    pub workflow_id: WorkflowId,
    pub status: WorkflowStatus,
    pub steps: Vec<PlannerStep>,
    pub waiting_question: Option<String>,
    pub completion: Option<Completion>,
}

impl From<Workflow> for PlannerLoopResult {
    fn from(workflow: Workflow) -> Self {
        Self {
            workflow_id: workflow.workflow_id,
            status: workflow.status,
            steps: workflow.steps,
            waiting_question: workflow.waiting_question,
            completion: workflow.completion,
        }
    }
}

/// One audit row queued for a step commit.
pub(crate) struct AuditEntry {
    pub event_type: AuditEventType,
    pub step_number: Option<u32>,
    pub detail: serde_json::Value,
    pub signal: Option<SignalId>,
}

/// Atomic unit for one step: workflow write plus every record that belongs
/// to the step, committed in a single transaction.
pub(crate) struct StepCommit {
    pub workflow: Workflow,
    pub audits: Vec<AuditEntry>,
    pub policy: Option<PolicyDecisionRecord>,
    pub approval: Option<ApprovalDecisionRecord>,
    pub events: Vec<RunEventBody>,
}

impl StepCommit {
    pub fn new(workflow: Workflow) -> Self {
        Self { workflow, audits: Vec::new(), policy: None, approval: None, events: Vec::new() }
    }
}

/// Drives one workflow through the stage pipeline until it parks or ends.
pub struct PlannerLoop<C: Clock> {
    pub(crate) store: MemoryStore,
    pub(crate) registry: Arc<ToolRegistry>,
    pub(crate) adapter: Arc<ActionAdapter<C>>,
    pub(crate) planner: Arc<dyn Planner>,
    pub(crate) policy: Arc<dyn PolicyPack>,
    pub(crate) approval: Arc<dyn ApprovalPolicy>,
    pub(crate) context: Arc<dyn ContextBuilder>,
    pub(crate) clock: C,
    pub(crate) config: LoopConfig,
}

impl<C: Clock> PlannerLoop<C> {
    pub fn new(deps: EngineDeps<C>) -> Self {
        Self {
            store: deps.store,
            registry: deps.registry,
            adapter: deps.adapter,
            planner: deps.planner,
            policy: deps.policy,
            approval: deps.approval,
            context: deps.context,
            clock: deps.clock,
            config: deps.config,
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Control-plane entry: run a request under an ad-hoc run identity (or
    /// the enqueued job's run when one exists).
    pub async fn run_request(
        &self,
        request: &ObjectiveRequestV1,
    ) -> Result<PlannerLoopResult, EngineError> {
        validate_objective_request(request)?;
        let scope = request.scope();
        let run_id = self.store.with_transaction(|state| {
            if let Some(job) = state.get_queue_job(&scope, request.request_id.as_str()) {
                return Ok(job.run_id);
            }
            let run_id = RunId::new();
            state.ensure_run(&run_id, &JobId::new(), &scope);
            Ok(run_id)
        })?;
        self.run(request, &run_id).await
    }

    /// Run the loop for one request under an existing run identity.
    ///
    /// Handles both fresh starts and resumption: a workflow parked
    /// `waiting_signal` first drains its pending inbox, then re-enters the
    /// pipeline.
    pub async fn run(
        &self,
        request: &ObjectiveRequestV1,
        run_id: &RunId,
    ) -> Result<PlannerLoopResult, EngineError> {
        validate_objective_request(request)?;
        let scope = request.scope();
        let now = self.clock.epoch_ms();

        let mut workflow = self.store.with_transaction(|state| {
            state.insert_objective_request(request)?;
            match state.get_workflow(&scope, request.workflow_id.as_str()) {
                Some(existing) => Ok(existing.clone()),
                None => {
                    let workflow =
                        Workflow::new(request.workflow_id, scope.clone(), &request.thread_id, now);
                    state.upsert_workflow(&workflow)?;
                    Ok(workflow)
                }
            }
        })?;

        let telemetry = Telemetry::new(*run_id, scope.clone(), request.request_id.as_str());

        if workflow.status == WorkflowStatus::WaitingSignal {
            workflow = self.drain_signals(request, workflow, &telemetry).await?;
        }

        while workflow.status == WorkflowStatus::Running {
            if workflow.next_step_number() >= self.config.max_steps {
                workflow = self.exhaust_steps(request, workflow, &telemetry)?;
                break;
            }
            workflow = self.step(request, workflow, &telemetry).await?;
        }

        tracing::info!(
            workflow_id = %workflow.workflow_id,
            status = %workflow.status,
            steps = workflow.steps.len(),
            "planner loop yielded"
        );
        Ok(workflow.into())
    }

    /// One trip through the pipeline stages, ending in a single commit.
    async fn step(
        &self,
        request: &ObjectiveRequestV1,
        mut workflow: Workflow,
        telemetry: &Telemetry,
    ) -> Result<Workflow, EngineError> {
        let step_started = self.clock.now();
        let scope = workflow.scope.clone();
        let workflow_id = workflow.workflow_id;
        let step_index = workflow.next_step_number();

        // Stage: build planning context.
        let signals: Vec<SignalRecord> = self.store.read(|state| {
            state
                .list_signals(&scope, Some(workflow_id.as_str()))
                .into_iter()
                .cloned()
                .collect()
        });
        let planner_input = self.context.build(&ContextArgs {
            request,
            workflow: &workflow,
            signals: &signals,
            policy_constraints: self.policy.constraints(),
            available_tools: self.registry.list_tools(&scope),
            memory_limit: self.config.memory_limit,
        });

        // Stage: plan (external I/O).
        let intent = self.planner.plan(&planner_input).await?;

        // Stage: validate the intent shape before anything can act on it.
        let intent_kind = intent.kind();
        if let Err(error) = validate_intent(&intent) {
            tracing::warn!(
                workflow_id = %workflow_id,
                step = step_index,
                error = %error,
                "planner returned an invalid intent"
            );
            let step = self.make_step(
                &workflow,
                step_index,
                planner_input,
                intent,
                StepStatus::Failed,
                None,
                Some(ErrorCode::ValidationError.to_string()),
            );
            workflow.steps.push(step);
            workflow.updated_at_ms = self.clock.epoch_ms();
            let mut commit = StepCommit::new(workflow);
            commit.events.push(RunEventBody::PlannerValidationFailure {
                workflow_id,
                step_number: step_index,
                issues: error.issues,
            });
            commit
                .events
                .push(self.latency_event(workflow_id, step_index, intent_kind, step_started));
            return self.commit(request, commit, telemetry);
        }

        // Stage: evaluate policy.
        let ctx = PolicyContext {
            request,
            step_index,
            intent: &intent,
            planner_input: &planner_input,
        };
        let outcome = self.policy.evaluate(&ctx);
        let outcome_kind = outcome.kind();
        let mut policy_record = PolicyDecisionRecord {
            scope: scope.clone(),
            workflow_id,
            step_number: step_index,
            policy_id: self.policy.policy_id().to_string(),
            policy_version: self.policy.version().to_string(),
            outcome: outcome_kind,
            original_intent: intent.clone(),
            effective_intent: None,
            reason: None,
            signal_correlation_id: None,
            occurred_at_ms: self.clock.epoch_ms(),
        };
        let policy_event = RunEventBody::PolicyDecision {
            workflow_id,
            step_number: step_index,
            policy_id: policy_record.policy_id.clone(),
            outcome: outcome_kind,
        };

        let effective = match outcome {
            PolicyOutcome::Allow => {
                intent.clone()
            }
            PolicyOutcome::Rewrite { intent: rewritten } => {
                // A pack emitting an invalid substitute is a defect, not
                // planner misbehavior.
                validate_intent(&rewritten)
                    .map_err(|e| EngineError::Internal(format!("policy rewrite invalid: {e}")))?;
                policy_record.effective_intent = Some(rewritten.clone());
                rewritten
            }
            PolicyOutcome::Block { reason } => {
                tracing::info!(
                    workflow_id = %workflow_id,
                    step = step_index,
                    policy = %policy_record.policy_id,
                    reason = %reason,
                    "policy blocked intent"
                );
                policy_record.reason = Some(reason.clone());
                let step = self.make_step(
                    &workflow,
                    step_index,
                    planner_input,
                    intent.clone(),
                    StepStatus::Failed,
                    None,
                    Some(ErrorCode::PolicyBlocked.to_string()),
                );
                workflow.steps.push(step);
                workflow.updated_at_ms = self.clock.epoch_ms();
                if self.config.fail_workflow_on_block {
                    workflow.status = WorkflowStatus::Failed;
                    workflow.error_summary =
                        Some(format!("{}: {reason}", ErrorCode::PolicyBlocked));
                }

                let terminal = workflow.status == WorkflowStatus::Failed;
                let mut commit = StepCommit::new(workflow);
                commit.policy = Some(policy_record);
                commit.audits.push(AuditEntry {
                    event_type: AuditEventType::PolicyBlock,
                    step_number: Some(step_index),
                    detail: json!({"reason": reason, "intent": intent}),
                    signal: None,
                });
                commit.events.push(policy_event);
                commit
                    .events
                    .push(self.latency_event(workflow_id, step_index, intent_kind, step_started));
                if terminal {
                    commit.audits.push(AuditEntry {
                        event_type: AuditEventType::WorkflowTerminalFailed,
                        step_number: Some(step_index),
                        detail: json!({"error": "POLICY_BLOCKED"}),
                        signal: None,
                    });
                    commit.events.push(RunEventBody::WorkflowTerminal {
                        workflow_id,
                        status: WorkflowStatus::Failed,
                    });
                }
                return self.commit(request, commit, telemetry);
            }
        };

        let effective_kind = effective.kind();
        let allow_audit = AuditEntry {
            event_type: match outcome_kind {
                charter_core::PolicyOutcomeKind::Rewrite => AuditEventType::PolicyRewrite,
                _ => AuditEventType::PolicyAllow,
            },
            step_number: Some(step_index),
            detail: match &policy_record.effective_intent {
                Some(rewritten) => json!({"original": intent, "rewritten": rewritten}),
                None => json!({"intent": intent}),
            },
            signal: None,
        };

        // Stage: evaluate approval.
        let approval_ctx = PolicyContext {
            request,
            step_index,
            intent: &effective,
            planner_input: &planner_input,
        };
        let assessment = self.approval.assess(&approval_ctx);
        if assessment.requires_approval {
            let approval_id = ApprovalId::new();
            let now = self.clock.epoch_ms();
            let pending = PendingApproval {
                approval_id,
                request_id: request.request_id.clone(),
                step_number: step_index,
                intent: effective.clone(),
                risk_class: assessment.risk_class,
                reason_code: assessment.reason_code.clone(),
                requested_at_ms: now,
                status: ApprovalStatus::Pending,
            };
            tracing::info!(
                workflow_id = %workflow_id,
                step = step_index,
                approval_id = %approval_id,
                risk = %assessment.risk_class,
                "parking workflow for approval"
            );
            let step = self.make_step(
                &workflow,
                step_index,
                planner_input,
                effective.clone(),
                StepStatus::WaitingSignal,
                None,
                None,
            );
            workflow.steps.push(step);
            workflow.status = WorkflowStatus::WaitingSignal;
            workflow.pending_approval = Some(pending);
            workflow.updated_at_ms = now;

            let mut commit = StepCommit::new(workflow);
            commit.policy = Some(policy_record);
            commit.approval = Some(ApprovalDecisionRecord {
                approval_id,
                scope: scope.clone(),
                workflow_id,
                step_number: step_index,
                risk_class: assessment.risk_class,
                reason_code: assessment.reason_code.clone(),
                status: ApprovalStatus::Pending,
                signal_correlation_id: None,
                occurred_at_ms: now,
            });
            commit.audits.push(allow_audit);
            commit.audits.push(AuditEntry {
                event_type: AuditEventType::ApprovalPending,
                step_number: Some(step_index),
                detail: json!({
                    "approval_id": approval_id,
                    "risk_class": assessment.risk_class,
                    "reason_code": assessment.reason_code,
                }),
                signal: None,
            });
            commit.events.push(policy_event);
            commit
                .events
                .push(self.latency_event(workflow_id, step_index, effective_kind, step_started));
            return self.commit(request, commit, telemetry);
        }

        // Stage: execute the intent.
        let mut commit_events = vec![policy_event];
        let mut audits = vec![allow_audit];
        match effective {
            PlannerIntent::ToolCall { ref tool_name, ref args } => {
                let action = ActionRequest {
                    scope: scope.clone(),
                    request_id: request.request_id.clone(),
                    step_number: step_index,
                    tool_name: tool_name.clone(),
                    args: args.clone(),
                };
                match self.adapter.execute(&action).await {
                    Ok(outcome) => {
                        let result = serde_json::to_value(&outcome)
                            .map_err(|e| EngineError::Internal(e.to_string()))?;
                        let step = self.make_step(
                            &workflow,
                            step_index,
                            planner_input,
                            effective.clone(),
                            StepStatus::ToolExecuted,
                            Some(result),
                            None,
                        );
                        workflow.steps.push(step);
                    }
                    Err(error) => {
                        tracing::warn!(
                            workflow_id = %workflow_id,
                            step = step_index,
                            tool = %tool_name,
                            error = %error,
                            "tool execution failed"
                        );
                        let step = self.make_step(
                            &workflow,
                            step_index,
                            planner_input,
                            effective.clone(),
                            StepStatus::Failed,
                            Some(json!({"error": error})),
                            Some(ErrorCode::ToolFailure.to_string()),
                        );
                        workflow.steps.push(step);
                    }
                }
            }
            PlannerIntent::AskUser { ref question } => {
                let step = self.make_step(
                    &workflow,
                    step_index,
                    planner_input,
                    effective.clone(),
                    StepStatus::WaitingSignal,
                    None,
                    None,
                );
                workflow.steps.push(step);
                workflow.status = WorkflowStatus::WaitingSignal;
                workflow.waiting_question = Some(question.clone());
            }
            PlannerIntent::Complete { ref output } => {
                let now = self.clock.epoch_ms();
                let step = self.make_step(
                    &workflow,
                    step_index,
                    planner_input,
                    effective.clone(),
                    StepStatus::Completed,
                    None,
                    None,
                );
                workflow.steps.push(step);
                workflow.status = WorkflowStatus::Completed;
                workflow.completion = Some(Completion { output: output.clone(), completed_at_ms: now });
                audits.push(AuditEntry {
                    event_type: AuditEventType::WorkflowTerminalCompleted,
                    step_number: Some(step_index),
                    detail: json!({"output": output}),
                    signal: None,
                });
                commit_events.push(RunEventBody::WorkflowTerminal {
                    workflow_id,
                    status: WorkflowStatus::Completed,
                });
            }
        }
        workflow.updated_at_ms = self.clock.epoch_ms();

        commit_events.push(self.latency_event(workflow_id, step_index, effective_kind, step_started));
        let mut commit = StepCommit::new(workflow);
        commit.policy = Some(policy_record);
        commit.audits = audits;
        commit.events = commit_events;
        self.commit(request, commit, telemetry)
    }

    /// Terminal failure when the step budget is exhausted.
    fn exhaust_steps(
        &self,
        request: &ObjectiveRequestV1,
        mut workflow: Workflow,
        telemetry: &Telemetry,
    ) -> Result<Workflow, EngineError> {
        tracing::warn!(
            workflow_id = %workflow.workflow_id,
            max_steps = self.config.max_steps,
            "step budget exhausted"
        );
        let workflow_id = workflow.workflow_id;
        workflow.status = WorkflowStatus::Failed;
        workflow.error_summary = Some(MAX_STEPS_EXHAUSTED.to_string());
        workflow.updated_at_ms = self.clock.epoch_ms();

        let mut commit = StepCommit::new(workflow);
        commit.audits.push(AuditEntry {
            event_type: AuditEventType::WorkflowTerminalFailed,
            step_number: None,
            detail: json!({"error": MAX_STEPS_EXHAUSTED}),
            signal: None,
        });
        commit.events.push(RunEventBody::WorkflowTerminal {
            workflow_id,
            status: WorkflowStatus::Failed,
        });
        self.commit(request, commit, telemetry)
    }

    /// Append a step's full record set in one transaction (I6).
    pub(crate) fn commit(
        &self,
        request: &ObjectiveRequestV1,
        commit: StepCommit,
        telemetry: &Telemetry,
    ) -> Result<Workflow, EngineError> {
        self.commit_with(request, commit, telemetry, |_| Ok(()))
    }

    /// [`Self::commit`] plus extra table work sharing the same transaction
    /// (signal acknowledgement on resume).
    pub(crate) fn commit_with(
        &self,
        request: &ObjectiveRequestV1,
        commit: StepCommit,
        telemetry: &Telemetry,
        extra: impl FnOnce(&mut charter_storage::StoreState) -> Result<(), charter_storage::StoreError>,
    ) -> Result<Workflow, EngineError> {
        let now = self.clock.epoch_ms();
        let workflow = commit.workflow;
        self.store.with_transaction(|state| {
            extra(state)?;
            state.upsert_workflow(&workflow)?;
            if let Some(policy) = commit.policy {
                state.append_policy_decision(policy);
            }
            if let Some(approval) = commit.approval {
                state.append_approval_decision(approval);
            }
            for entry in commit.audits {
                state.append_audit_record(AuditRecord {
                    audit_id: AuditId::new(),
                    scope: workflow.scope.clone(),
                    request_id: request.request_id.clone(),
                    step_number: entry.step_number,
                    event_type: entry.event_type,
                    occurred_at_ms: now,
                    signal_correlation_id: entry.signal,
                    detail: entry.detail,
                });
            }
            for body in commit.events {
                telemetry.emit(state, now, body);
            }
            if workflow.status != WorkflowStatus::Running {
                state.capture_runtime_snapshot(&workflow, now);
            }
            Ok(())
        })?;
        Ok(workflow)
    }

    pub(crate) fn make_step(
        &self,
        workflow: &Workflow,
        step_number: u32,
        planner_input: PlannerInputV1,
        planner_intent: PlannerIntent,
        status: StepStatus,
        tool_result: Option<serde_json::Value>,
        error_code: Option<String>,
    ) -> PlannerStep {
        PlannerStep {
            workflow_id: workflow.workflow_id,
            step_number,
            intent_kind: planner_intent.kind(),
            status,
            planner_input,
            planner_intent,
            tool_result,
            error_code,
            created_at_ms: self.clock.epoch_ms(),
        }
    }

    fn latency_event(
        &self,
        workflow_id: WorkflowId,
        step_number: u32,
        intent: charter_core::IntentKind,
        started: std::time::Instant,
    ) -> RunEventBody {
        let latency_ms = self.clock.now().duration_since(started).as_millis() as u64;
        RunEventBody::StepLatency { workflow_id, step_number, intent, latency_ms }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
