// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Planning context composition (the first pipeline stage).

use charter_core::{
    stable_string, ObjectiveRequestV1, PlannerInputV1, SignalRecord, Workflow,
};

/// Everything the context stage may draw from.
pub struct ContextArgs<'a> {
    pub request: &'a ObjectiveRequestV1,
    pub workflow: &'a Workflow,
    /// Signals delivered to this workflow, in occurrence order.
    pub signals: &'a [SignalRecord],
    pub policy_constraints: Vec<String>,
    pub available_tools: Vec<String>,
    /// Cap on `memory_context` entries (the long-term memory limit).
    pub memory_limit: usize,
}

/// Overridable context stage.
pub trait ContextBuilder: Send + Sync {
    fn build(&self, args: &ContextArgs<'_>) -> PlannerInputV1;
}

/// Default composition: tool results and signal payloads become memory
/// lines (newest kept, capped), prior steps are summarized structurally.
pub struct DefaultContextBuilder;

impl ContextBuilder for DefaultContextBuilder {
    fn build(&self, args: &ContextArgs<'_>) -> PlannerInputV1 {
        let mut memory: Vec<String> = Vec::new();
        for step in &args.workflow.steps {
            if let Some(result) = &step.tool_result {
                memory.push(format!("step {}: {}", step.step_number, stable_string(result)));
            }
        }
        for signal in args.signals {
            memory.push(format!(
                "signal {} ({}): {}",
                signal.signal_id,
                signal.signal_type,
                stable_string(&signal.payload)
            ));
        }
        if memory.len() > args.memory_limit {
            memory.drain(..memory.len() - args.memory_limit);
        }

        PlannerInputV1 {
            objective_prompt: args.request.objective_prompt.clone(),
            memory_context: memory,
            prior_step_summaries: args.workflow.step_summaries(),
            policy_constraints: args.policy_constraints.clone(),
            available_tools: args.available_tools.clone(),
            step_index: args.workflow.next_step_number(),
            scope: args.workflow.scope.clone(),
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
