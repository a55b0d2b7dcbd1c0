// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow table: upsert with invariant enforcement, scoped reads.

use super::types::WorkflowRuntimeSnapshot;
use super::StoreState;
use crate::error::StoreError;
use charter_core::{PlannerStep, ReadAccess, Scope, Workflow};

impl StoreState {
    /// Write a workflow back after a step commit.
    ///
    /// Enforces the step invariants on every write:
    /// - step numbers are gap-free and zero-based (`steps[i].step_number == i`)
    /// - a terminal workflow is immutable (identical rewrite is a no-op)
    pub fn upsert_workflow(&mut self, workflow: &Workflow) -> Result<(), StoreError> {
        for (i, step) in workflow.steps.iter().enumerate() {
            if step.step_number as usize != i {
                return Err(StoreError::InvariantViolation(format!(
                    "workflow {} step {} has number {}",
                    workflow.workflow_id, i, step.step_number
                )));
            }
        }

        let key = workflow.scope.entity_key(workflow.workflow_id.as_str());
        if let Some(existing) = self.workflows.get(&key) {
            if existing.is_terminal() {
                if existing == workflow {
                    return Ok(());
                }
                return Err(StoreError::TerminalWorkflow(
                    workflow.workflow_id.to_string(),
                ));
            }
        }
        self.workflows.insert(key, workflow.clone());
        Ok(())
    }

    pub fn get_workflow(&self, scope: &Scope, workflow_id: &str) -> Option<&Workflow> {
        // Re-check the stored scope: a key hit alone is not proof of
        // ownership when identifiers contain the key separator.
        self.workflows
            .get(&scope.entity_key(workflow_id))
            .filter(|w| &w.scope == scope && w.workflow_id == workflow_id)
    }

    /// Scope-unaware lookup, gated by an explicit access qualifier.
    pub fn find_workflow_by_id(
        &self,
        workflow_id: &str,
        access: &ReadAccess,
    ) -> Option<&Workflow> {
        self.workflows
            .values()
            .find(|w| w.workflow_id == workflow_id && access.permits(&w.scope))
    }

    /// Steps for one workflow, ordered by step number.
    pub fn list_planner_steps(&self, scope: &Scope, workflow_id: &str) -> Vec<&PlannerStep> {
        match self.get_workflow(scope, workflow_id) {
            Some(wf) => wf.steps.iter().collect(),
            None => Vec::new(),
        }
    }

    /// Capture the latest runtime snapshot for a workflow.
    pub fn capture_runtime_snapshot(&mut self, workflow: &Workflow, now_ms: u64) {
        let key = workflow.scope.entity_key(workflow.workflow_id.as_str());
        self.runtime_snapshots.insert(
            key,
            WorkflowRuntimeSnapshot {
                scope: workflow.scope.clone(),
                workflow_id: workflow.workflow_id,
                status: workflow.status,
                step_count: workflow.steps.len() as u32,
                captured_at_ms: now_ms,
            },
        );
    }
}
