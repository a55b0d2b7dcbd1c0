// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal tables: delivered signals, inbox, inbound receipts, thread map.

use super::types::{InboundMessageReceipt, SignalInboxEntry, WorkflowMessageThread};
use super::StoreState;
use charter_core::{InboxStatus, Scope, SignalRecord, SignalStatus};

impl StoreState {
    /// Record a delivered signal. Returns false when a signal with the same
    /// ID already exists in the scope (dedup).
    pub fn record_signal(&mut self, record: SignalRecord) -> bool {
        let exists = self
            .signals
            .iter()
            .any(|s| s.scope == record.scope && s.signal_id == record.signal_id);
        if exists {
            return false;
        }
        self.signals.push(record);
        true
    }

    /// Acknowledge a signal. Idempotent: acknowledging twice is a no-op.
    pub fn acknowledge_signal(&mut self, scope: &Scope, signal_id: &str) -> bool {
        match self
            .signals
            .iter_mut()
            .find(|s| &s.scope == scope && s.signal_id == signal_id)
        {
            Some(signal) => {
                signal.status = SignalStatus::Acknowledged;
                true
            }
            None => false,
        }
    }

    /// Signals for a scope (optionally one workflow), ordered by occurrence.
    pub fn list_signals(&self, scope: &Scope, workflow_id: Option<&str>) -> Vec<&SignalRecord> {
        let mut rows: Vec<&SignalRecord> = self
            .signals
            .iter()
            .filter(|s| &s.scope == scope)
            .filter(|s| workflow_id.is_none_or(|id| s.workflow_id == id))
            .collect();
        rows.sort_by(|a, b| {
            (a.occurred_at_ms, a.signal_id.as_str()).cmp(&(b.occurred_at_ms, b.signal_id.as_str()))
        });
        rows
    }

    /// Park a signal in the inbox. Returns false when an entry with the same
    /// `signal_id` already exists in the scope, regardless of status — the
    /// second delivery of a signal must not cause a second transition.
    pub fn insert_signal_inbox(&mut self, entry: SignalInboxEntry) -> bool {
        let exists = self
            .signal_inbox
            .iter()
            .any(|e| e.scope == entry.scope && e.signal_id == entry.signal_id);
        if exists {
            return false;
        }
        self.signal_inbox.push(entry);
        true
    }

    /// Pending inbox entries for a workflow, in `occurred_at` order.
    pub fn pending_signal_inbox(&self, scope: &Scope, workflow_id: &str) -> Vec<SignalInboxEntry> {
        let mut rows: Vec<SignalInboxEntry> = self
            .signal_inbox
            .iter()
            .filter(|e| {
                &e.scope == scope
                    && e.workflow_id == workflow_id
                    && e.status == InboxStatus::Pending
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.occurred_at_ms, a.signal_id.as_str()).cmp(&(b.occurred_at_ms, b.signal_id.as_str()))
        });
        rows
    }

    /// Mark an inbox entry consumed. Idempotent.
    pub fn mark_signal_consumed(&mut self, scope: &Scope, signal_id: &str) -> bool {
        match self
            .signal_inbox
            .iter_mut()
            .find(|e| &e.scope == scope && e.signal_id == signal_id)
        {
            Some(entry) => {
                entry.status = InboxStatus::Consumed;
                true
            }
            None => false,
        }
    }

    /// Insert an inbound receipt. Returns false on primary-key collision,
    /// which callers treat as "already processed".
    pub fn record_inbound_receipt(&mut self, receipt: InboundMessageReceipt) -> bool {
        let key = InboundMessageReceipt::key(
            &receipt.provider,
            &receipt.provider_team_id,
            &receipt.event_id,
        );
        if self.inbound_receipts.contains_key(&key) {
            return false;
        }
        self.inbound_receipts.insert(key, receipt);
        true
    }

    /// Register (or refresh) the conversation identity of an outbound
    /// notification so inbound replies can find their workflow.
    pub fn upsert_message_thread(&mut self, thread: WorkflowMessageThread) {
        let key =
            WorkflowMessageThread::key(&thread.channel_type, &thread.channel_id, &thread.thread_id);
        self.message_threads.insert(key, thread);
    }

    /// Resolve a conversation identity back to its workflow.
    pub fn resolve_message_thread(
        &self,
        channel_type: &str,
        channel_id: &str,
        thread_id: &str,
        provider_team_id: Option<&str>,
    ) -> Option<&WorkflowMessageThread> {
        let key = WorkflowMessageThread::key(channel_type, channel_id, thread_id);
        let thread = self.message_threads.get(&key)?;
        match (provider_team_id, thread.provider_team_id.as_deref()) {
            (Some(given), Some(stored)) if given != stored => None,
            _ => Some(thread),
        }
    }
}
