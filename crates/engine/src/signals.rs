// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal ingress and the resume path.
//!
//! Inbound events are deduped (receipt table for provider events, inbox
//! `signal_id` for everything), correlated to their workflow, parked in
//! the inbox as `pending`, and dispatched by requeueing the workflow's
//! continuation job. The worker drains the inbox in `occurred_at` order
//! when it re-enters the loop.

use crate::error::EngineError;
use crate::runtime::{AuditEntry, PlannerLoop, StepCommit};
use crate::telemetry::Telemetry;
use charter_core::{
    occurred_at_epoch_ms, validate_provider_callback, validate_signal, ApprovalStatus,
    AuditEventType, Clock, ContractError, ErrorCode, InboxStatus, ObjectiveRequestV1,
    PlannerIntent, ProviderCallbackV1, RunEventBody, Scope, SignalId, SignalRecord, SignalStatus,
    SignalType, StepStatus, Workflow, WorkflowId, WorkflowSignalV1, WorkflowStatus,
};
use charter_adapters::ActionRequest;
use charter_storage::{InboundMessageReceipt, SignalInboxEntry};
use serde_json::{json, Value};

/// Acknowledgement returned by the resume entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeAck {
    pub workflow_id: WorkflowId,
    pub status: &'static str,
    pub signal_type: SignalType,
}

/// An inbound message from a thread-capable provider, pre-resolution.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub provider: String,
    pub provider_team_id: String,
    pub event_id: String,
    pub channel_type: String,
    pub channel_id: String,
    pub thread_id: String,
    pub message_id: String,
    pub user_id: String,
    pub message: String,
}

impl<C: Clock> PlannerLoop<C> {
    /// Deliver an external signal to a waiting workflow.
    ///
    /// Exactly-once: redelivery of the same `signal_id` within the scope is
    /// acknowledged without a second state transition.
    pub fn resume_with_signal(&self, signal: &WorkflowSignalV1) -> Result<ResumeAck, EngineError> {
        validate_signal(signal)?;
        let scope = signal.scope();
        let occurred_at_ms = occurred_at_epoch_ms(&signal.occurred_at)?;
        self.enqueue_workflow_signal(
            &scope,
            signal.workflow_id,
            signal.signal_id.clone(),
            signal.signal_type,
            signal.payload.clone(),
            occurred_at_ms,
        )
    }

    /// Deliver a provider callback (timer, approval webhook, external event).
    ///
    /// The receipt table makes redelivery of the same
    /// `(provider, team, event_id)` a no-op.
    pub fn resume_with_provider_callback(
        &self,
        callback: &ProviderCallbackV1,
    ) -> Result<ResumeAck, EngineError> {
        validate_provider_callback(callback)?;
        let scope = callback.scope();
        let occurred_at_ms = occurred_at_epoch_ms(&callback.occurred_at)?;
        let now = self.clock.epoch_ms();

        let inserted = self.store.with_transaction(|state| {
            Ok(state.record_inbound_receipt(InboundMessageReceipt {
                provider: callback.provider.clone(),
                provider_team_id: callback.provider_team_id.clone(),
                event_id: callback.event_id.clone(),
                scope: scope.clone(),
                received_at_ms: now,
            }))
        })?;
        if !inserted {
            tracing::debug!(
                provider = %callback.provider,
                event_id = %callback.event_id,
                "duplicate provider callback ignored"
            );
            return Ok(ResumeAck {
                workflow_id: callback.workflow_id,
                status: "resumed",
                signal_type: callback.signal_type,
            });
        }

        let signal_id = SignalId::new(format!("{}:{}", callback.provider, callback.event_id));
        self.enqueue_workflow_signal(
            &scope,
            callback.workflow_id,
            signal_id,
            callback.signal_type,
            callback.payload.clone(),
            occurred_at_ms,
        )
    }

    /// Ingest a raw inbound message: dedup by receipt, resolve the thread
    /// identity to a workflow, validate scope, enqueue a `user_input`
    /// signal. Returns `None` when the event was already processed or no
    /// thread mapping exists.
    pub fn ingest_inbound_message(
        &self,
        message: &InboundMessage,
    ) -> Result<Option<ResumeAck>, EngineError> {
        let now = self.clock.epoch_ms();

        let thread = self.store.read(|state| {
            state
                .resolve_message_thread(
                    &message.channel_type,
                    &message.channel_id,
                    &message.thread_id,
                    Some(&message.provider_team_id),
                )
                .cloned()
        });
        let Some(thread) = thread else {
            tracing::debug!(
                channel = %message.channel_id,
                thread = %message.thread_id,
                "inbound message has no workflow thread mapping"
            );
            return Ok(None);
        };

        let inserted = self.store.with_transaction(|state| {
            Ok(state.record_inbound_receipt(InboundMessageReceipt {
                provider: message.provider.clone(),
                provider_team_id: message.provider_team_id.clone(),
                event_id: message.event_id.clone(),
                scope: thread.scope.clone(),
                received_at_ms: now,
            }))
        })?;
        if !inserted {
            return Ok(None);
        }

        let signal_id = SignalId::new(format!("msg:{}:{}", message.provider, message.event_id));
        let payload = json!({
            "message": message.message,
            "message_id": message.message_id,
            "user_id": message.user_id,
        });
        let ack = self.enqueue_workflow_signal(
            &thread.scope,
            thread.workflow_id,
            signal_id,
            SignalType::UserInput,
            payload,
            now,
        )?;
        Ok(Some(ack))
    }

    /// Park a signal for a workflow: dedup by inbox `signal_id`, record
    /// the delivery, emit `signal:received`, and requeue the continuation
    /// job. The validated ingress entry points all end here.
    pub fn enqueue_workflow_signal(
        &self,
        scope: &Scope,
        workflow_id: WorkflowId,
        signal_id: SignalId,
        signal_type: SignalType,
        payload: Value,
        occurred_at_ms: u64,
    ) -> Result<ResumeAck, EngineError> {
        let now = self.clock.epoch_ms();
        let workflow = self
            .store
            .read(|state| state.get_workflow(scope, workflow_id.as_str()).cloned())
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;
        if workflow.is_terminal() {
            return Err(EngineError::Contract(ContractError::single(format!(
                "workflow {workflow_id} is terminal and cannot receive signals"
            ))));
        }

        // The lineage job is keyed by request id; find the run through the
        // workflow instead.
        let run_id = self.store.read(|state| {
            state
                .queue_jobs
                .values()
                .find(|j| &j.scope == scope && j.workflow_id == workflow_id.as_str())
                .map(|j| j.run_id)
        });

        self.store.with_transaction(|state| {
            let inserted = state.insert_signal_inbox(SignalInboxEntry {
                signal_id: signal_id.clone(),
                scope: scope.clone(),
                workflow_id,
                run_id,
                signal_type,
                payload: payload.clone(),
                occurred_at_ms,
                status: InboxStatus::Pending,
            });
            if !inserted {
                tracing::debug!(signal_id = %signal_id, "duplicate signal ignored");
                return Ok(());
            }

            state.record_signal(SignalRecord {
                signal_id: signal_id.clone(),
                scope: scope.clone(),
                workflow_id,
                signal_type,
                payload: payload.clone(),
                occurred_at_ms,
                status: SignalStatus::Received,
            });

            if let Some(run_id) = run_id {
                let telemetry = Telemetry::new(run_id, scope.clone(), signal_id.as_str());
                telemetry.emit(
                    state,
                    now,
                    RunEventBody::SignalReceived { workflow_id, signal_id: signal_id.clone(), signal_type },
                );
            }

            state.requeue_continuation(scope, workflow_id.as_str(), now);
            Ok(())
        })?;

        tracing::info!(
            workflow_id = %workflow_id,
            signal_id = %signal_id,
            signal_type = %signal_type,
            "signal delivered"
        );
        Ok(ResumeAck { workflow_id, status: "resumed", signal_type })
    }

    /// Record an inbound receipt without further processing. Returns
    /// whether the receipt was newly inserted.
    pub fn record_inbound_message_receipt(
        &self,
        provider: &str,
        provider_team_id: &str,
        event_id: &str,
        scope: &Scope,
    ) -> Result<bool, EngineError> {
        let now = self.clock.epoch_ms();
        Ok(self.store.with_transaction(|state| {
            Ok(state.record_inbound_receipt(InboundMessageReceipt {
                provider: provider.to_string(),
                provider_team_id: provider_team_id.to_string(),
                event_id: event_id.to_string(),
                scope: scope.clone(),
                received_at_ms: now,
            }))
        })?)
    }

    /// Pending inbox entries for a workflow, in drain order.
    pub fn list_pending_workflow_signals(
        &self,
        scope: &Scope,
        workflow_id: &str,
    ) -> Vec<SignalInboxEntry> {
        self.store.read(|state| state.pending_signal_inbox(scope, workflow_id))
    }

    /// Mark one inbox entry consumed (idempotent).
    pub fn mark_workflow_signal_consumed(
        &self,
        scope: &Scope,
        signal_id: &str,
    ) -> Result<bool, EngineError> {
        Ok(self.store.with_transaction(|state| {
            let consumed = state.mark_signal_consumed(scope, signal_id);
            state.acknowledge_signal(scope, signal_id);
            Ok(consumed)
        })?)
    }

    /// Drain pending signals for a parked workflow, applying each one's
    /// state transition in its own transaction, oldest first.
    pub(crate) async fn drain_signals(
        &self,
        request: &ObjectiveRequestV1,
        mut workflow: Workflow,
        telemetry: &Telemetry,
    ) -> Result<Workflow, EngineError> {
        let scope = workflow.scope.clone();
        let pending = self
            .store
            .read(|state| state.pending_signal_inbox(&scope, workflow.workflow_id.as_str()));

        for entry in pending {
            workflow = self.consume_signal(request, workflow, &entry, telemetry).await?;
        }
        Ok(workflow)
    }

    /// Apply one signal to the workflow.
    async fn consume_signal(
        &self,
        request: &ObjectiveRequestV1,
        mut workflow: Workflow,
        entry: &SignalInboxEntry,
        telemetry: &Telemetry,
    ) -> Result<Workflow, EngineError> {
        let scope = workflow.scope.clone();
        let workflow_id = workflow.workflow_id;
        let mut audits: Vec<AuditEntry> = Vec::new();
        let mut approval_record = None;

        match entry.signal_type {
            SignalType::Approval => {
                let Some(pending) = workflow.pending_approval.clone() else {
                    tracing::warn!(signal_id = %entry.signal_id, "approval signal with no pending approval");
                    return self.finish_signal(request, workflow, entry, audits, None, telemetry);
                };
                let resolution = ApprovalResolution::from_payload(&entry.payload);
                let Some(resolution) = resolution else {
                    tracing::warn!(signal_id = %entry.signal_id, "malformed approval payload");
                    return self.finish_signal(request, workflow, entry, audits, None, telemetry);
                };
                if resolution.approval_id != pending.approval_id.as_str() {
                    tracing::warn!(
                        signal_id = %entry.signal_id,
                        expected = %pending.approval_id,
                        got = %resolution.approval_id,
                        "approval signal for a different gate"
                    );
                    return self.finish_signal(request, workflow, entry, audits, None, telemetry);
                }

                let status = if resolution.approved {
                    ApprovalStatus::Approved
                } else {
                    ApprovalStatus::Rejected
                };
                approval_record = Some(charter_core::ApprovalDecisionRecord {
                    approval_id: pending.approval_id,
                    scope: scope.clone(),
                    workflow_id,
                    step_number: pending.step_number,
                    risk_class: pending.risk_class,
                    reason_code: pending.reason_code.clone(),
                    status,
                    signal_correlation_id: Some(entry.signal_id.clone()),
                    occurred_at_ms: self.clock.epoch_ms(),
                });
                audits.push(AuditEntry {
                    event_type: if resolution.approved {
                        AuditEventType::ApprovalApproved
                    } else {
                        AuditEventType::ApprovalRejected
                    },
                    step_number: Some(pending.step_number),
                    detail: json!({"approval_id": pending.approval_id}),
                    signal: Some(entry.signal_id.clone()),
                });

                if resolution.approved {
                    // Re-execute the parked intent at the same step number.
                    // The idempotency key makes a crash between approval and
                    // commit safe: re-execution replays the recorded result.
                    let step_number = pending.step_number;
                    let (tool_result, step_status, error_code) = match &pending.intent {
                        PlannerIntent::ToolCall { tool_name, args } => {
                            let action = ActionRequest {
                                scope: scope.clone(),
                                request_id: request.request_id.clone(),
                                step_number,
                                tool_name: tool_name.clone(),
                                args: args.clone(),
                            };
                            match self.adapter.execute(&action).await {
                                Ok(outcome) => {
                                    let value = serde_json::to_value(&outcome)
                                        .map_err(|e| EngineError::Internal(e.to_string()))?;
                                    (Some(value), StepStatus::ToolExecuted, None)
                                }
                                Err(error) => (
                                    Some(json!({"error": error})),
                                    StepStatus::Failed,
                                    Some(ErrorCode::ToolFailure.to_string()),
                                ),
                            }
                        }
                        // Non-tool intents gated by approval just proceed.
                        PlannerIntent::AskUser { .. } | PlannerIntent::Complete { .. } => {
                            (None, StepStatus::Completed, None)
                        }
                    };
                    update_step(&mut workflow, step_number, step_status, tool_result, error_code);
                } else {
                    update_step(
                        &mut workflow,
                        pending.step_number,
                        StepStatus::Failed,
                        None,
                        Some("APPROVAL_REJECTED".to_string()),
                    );
                }
                workflow.pending_approval = None;
                workflow.status = WorkflowStatus::Running;
            }

            SignalType::UserInput => {
                // Resolve the parked ask_user step with the reply. A reply
                // while parked on an approval gate must not touch the gated
                // step, so the guard is the waiting question, not the step.
                let waiting_step = workflow
                    .waiting_question
                    .as_ref()
                    .and_then(|_| {
                        workflow
                            .steps
                            .iter()
                            .rfind(|s| s.status == StepStatus::WaitingSignal)
                    })
                    .map(|s| s.step_number);
                if let Some(step_number) = waiting_step {
                    update_step(
                        &mut workflow,
                        step_number,
                        StepStatus::Completed,
                        Some(json!({"user_reply": entry.payload})),
                        None,
                    );
                    workflow.waiting_question = None;
                    workflow.status = WorkflowStatus::Running;
                } else {
                    tracing::warn!(signal_id = %entry.signal_id, "user input with no waiting step");
                }
            }

            // Generic signals only feed planning context; the workflow
            // resumes and the planner decides what they mean.
            SignalType::Timer | SignalType::ExternalEvent => {
                if workflow.pending_approval.is_none() && workflow.waiting_question.is_none() {
                    workflow.status = WorkflowStatus::Running;
                }
            }
        }

        self.finish_signal(request, workflow, entry, audits, approval_record, telemetry)
    }

    /// Commit a consumed signal: workflow write, inbox ack, signal ack,
    /// records, and events in one transaction.
    fn finish_signal(
        &self,
        request: &ObjectiveRequestV1,
        workflow: Workflow,
        entry: &SignalInboxEntry,
        audits: Vec<AuditEntry>,
        approval_record: Option<charter_core::ApprovalDecisionRecord>,
        telemetry: &Telemetry,
    ) -> Result<Workflow, EngineError> {
        let workflow_id = workflow.workflow_id;
        let mut commit = StepCommit::new(workflow);
        commit.audits = audits;
        commit.approval = approval_record;
        commit.events.push(RunEventBody::SignalConsumed {
            workflow_id,
            signal_id: entry.signal_id.clone(),
        });

        let scope = entry.scope.clone();
        let signal_id = entry.signal_id.clone();
        let workflow = self.commit_with(request, commit, telemetry, move |state| {
            state.mark_signal_consumed(&scope, signal_id.as_str());
            state.acknowledge_signal(&scope, signal_id.as_str());
            Ok(())
        })?;
        Ok(workflow)
    }
}

/// Parsed approval payload: `{"approval_id": "...", "decision": "approved"}`.
struct ApprovalResolution {
    approval_id: String,
    approved: bool,
}

impl ApprovalResolution {
    fn from_payload(payload: &Value) -> Option<Self> {
        let approval_id = payload.get("approval_id")?.as_str()?.to_string();
        let decision = payload.get("decision")?.as_str()?;
        let approved = match decision {
            "approved" => true,
            "rejected" => false,
            _ => return None,
        };
        Some(Self { approval_id, approved })
    }
}

/// Mutate a committed step in place (same step number, final status).
fn update_step(
    workflow: &mut Workflow,
    step_number: u32,
    status: StepStatus,
    tool_result: Option<Value>,
    error_code: Option<String>,
) {
    if let Some(step) = workflow.steps.iter_mut().find(|s| s.step_number == step_number) {
        step.status = status;
        if tool_result.is_some() {
            step.tool_result = tool_result;
        }
        step.error_code = error_code;
    }
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;
