// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::state::types::{InboundMessageReceipt, SignalInboxEntry, WorkflowMessageThread};
use charter_core::{InboxStatus, RunId};

fn inbox_entry(signal_id: &str, occurred_at_ms: u64) -> SignalInboxEntry {
    SignalInboxEntry {
        signal_id: SignalId::new(signal_id),
        scope: scope(),
        workflow_id: WorkflowId::from_string("wfl-test-1"),
        run_id: Some(RunId::from_string("run-1")),
        signal_type: SignalType::UserInput,
        payload: json!({"message": "yes"}),
        occurred_at_ms,
        status: InboxStatus::Pending,
    }
}

#[test]
fn record_signal_dedups_by_id_within_scope() {
    let mut state = StoreState::new();
    assert!(state.record_signal(signal_record(&scope(), "sig-1", 10)));
    assert!(!state.record_signal(signal_record(&scope(), "sig-1", 20)));
    // Same ID in a different scope is a different signal.
    assert!(state.record_signal(signal_record(&other_scope(), "sig-1", 10)));
}

#[test]
fn acknowledge_signal_is_idempotent() {
    let mut state = StoreState::new();
    state.record_signal(signal_record(&scope(), "sig-1", 10));

    assert!(state.acknowledge_signal(&scope(), "sig-1"));
    assert!(state.acknowledge_signal(&scope(), "sig-1"));
    assert_eq!(state.signals[0].status, SignalStatus::Acknowledged);

    assert!(!state.acknowledge_signal(&scope(), "sig-unknown"));
}

#[test]
fn list_signals_orders_by_occurrence() {
    let mut state = StoreState::new();
    state.record_signal(signal_record(&scope(), "sig-b", 30));
    state.record_signal(signal_record(&scope(), "sig-a", 10));
    state.record_signal(signal_record(&other_scope(), "sig-x", 5));

    let listed = state.list_signals(&scope(), None);
    let ids: Vec<&str> = listed.iter().map(|s| s.signal_id.as_str()).collect();
    assert_eq!(ids, vec!["sig-a", "sig-b"]);
}

#[test]
fn inbox_insert_dedups_even_after_consumption() {
    let mut state = StoreState::new();
    assert!(state.insert_signal_inbox(inbox_entry("sig-1", 10)));
    state.mark_signal_consumed(&scope(), "sig-1");
    // Redelivery of a consumed signal must not create a second entry.
    assert!(!state.insert_signal_inbox(inbox_entry("sig-1", 99)));
    assert_eq!(state.signal_inbox.len(), 1);
}

#[test]
fn pending_inbox_is_drained_in_occurred_order() {
    let mut state = StoreState::new();
    state.insert_signal_inbox(inbox_entry("sig-late", 50));
    state.insert_signal_inbox(inbox_entry("sig-early", 10));
    let mut consumed = inbox_entry("sig-done", 5);
    consumed.status = InboxStatus::Consumed;
    state.signal_inbox.push(consumed);

    let pending = state.pending_signal_inbox(&scope(), "wfl-test-1");
    let ids: Vec<&str> = pending.iter().map(|e| e.signal_id.as_str()).collect();
    assert_eq!(ids, vec!["sig-early", "sig-late"]);
}

#[test]
fn receipt_insert_reports_primary_key_collision() {
    let mut state = StoreState::new();
    let receipt = InboundMessageReceipt {
        provider: "slack".to_string(),
        provider_team_id: "T1".to_string(),
        event_id: "Ev1".to_string(),
        scope: scope(),
        received_at_ms: 100,
    };
    assert!(state.record_inbound_receipt(receipt.clone()));
    assert!(!state.record_inbound_receipt(receipt));
}

#[test]
fn message_thread_resolution_checks_team_id() {
    let mut state = StoreState::new();
    state.upsert_message_thread(WorkflowMessageThread {
        channel_type: "channel".to_string(),
        channel_id: "C1".to_string(),
        thread_id: "123.456".to_string(),
        provider_team_id: Some("T1".to_string()),
        scope: scope(),
        workflow_id: WorkflowId::from_string("wfl-test-1"),
        run_id: RunId::from_string("run-1"),
    });

    assert!(state
        .resolve_message_thread("channel", "C1", "123.456", Some("T1"))
        .is_some());
    assert!(state
        .resolve_message_thread("channel", "C1", "123.456", Some("T2"))
        .is_none());
    assert!(state
        .resolve_message_thread("channel", "C1", "999.000", Some("T1"))
        .is_none());
    // Caller without a team ID still resolves.
    assert!(state
        .resolve_message_thread("channel", "C1", "123.456", None)
        .is_some());
}
