//! Integration tests for the call ledger against an in-memory store.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use roadcall_call_ledger::{
    Call, CallChange, CallFilter, CallLedger, CallStatus, CallStore, EndReason, LedgerError,
    Party, StaticDirectory,
};

async fn test_ledger() -> CallLedger {
    let store = CallStore::in_memory().await.expect("store creation failed");
    let directory = StaticDirectory::new()
        .with_entry("cust-1", "Dana Driver")
        .with_entry("part-1", "Tow Pros LLC")
        .with_entry("part-2", "Lakeside Towing");
    CallLedger::new(store, Arc::new(directory))
}

async fn ringing_call(ledger: &CallLedger) -> Call {
    ledger
        .create_call(Party::customer("cust-1"), Party::partner("part-1"), false)
        .await
        .expect("call creation failed")
}

#[tokio::test]
async fn create_rejects_self_call() {
    let ledger = test_ledger().await;
    let err = ledger
        .create_call(Party::customer("cust-1"), Party::customer("cust-1"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::SelfCallNotAllowed));
}

#[tokio::test]
async fn create_rejects_busy_receiver() {
    let ledger = test_ledger().await;
    ringing_call(&ledger).await;

    let err = ledger
        .create_call(Party::customer("cust-2"), Party::partner("part-1"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ReceiverUnavailable(_)));
}

#[tokio::test]
async fn create_rejects_busy_caller() {
    let ledger = test_ledger().await;
    ringing_call(&ledger).await;

    let err = ledger
        .create_call(Party::customer("cust-1"), Party::partner("part-2"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::CallerBusy(_)));
}

#[tokio::test]
async fn receiver_frees_up_after_terminal_state() {
    let ledger = test_ledger().await;
    let call = ringing_call(&ledger).await;
    ledger
        .transition(call.id, CallStatus::Rejected, None)
        .await
        .unwrap();

    // Both parties can call again once the first call is terminal.
    ledger
        .create_call(Party::customer("cust-1"), Party::partner("part-1"), false)
        .await
        .expect("parties should be free again");
}

#[tokio::test]
async fn support_intake_accepts_concurrent_callers() {
    let ledger = test_ledger().await;
    ledger
        .create_call(Party::customer("cust-1"), Party::support_intake(), false)
        .await
        .unwrap();
    ledger
        .create_call(Party::partner("part-1"), Party::support_intake(), false)
        .await
        .expect("intake party must not count as busy");
}

#[tokio::test]
async fn connect_then_hangup_stamps_timestamps_in_order() {
    let ledger = test_ledger().await;
    let call = ringing_call(&ledger).await;
    assert_eq!(call.status, CallStatus::Ringing);
    assert!(call.connected_at.is_none());

    let call = ledger
        .transition(call.id, CallStatus::Connected, None)
        .await
        .unwrap();
    let connected_at = call.connected_at.expect("connected_at must be set");

    let call = ledger
        .transition(call.id, CallStatus::Ended, Some(EndReason::Hangup))
        .await
        .unwrap();
    let ended_at = call.ended_at.expect("ended_at must be set");

    assert_eq!(call.status, CallStatus::Ended);
    assert_eq!(call.end_reason, Some(EndReason::Hangup));
    assert!(connected_at <= ended_at);
}

#[tokio::test]
async fn rejected_call_never_has_connected_at() {
    let ledger = test_ledger().await;
    let call = ringing_call(&ledger).await;

    let call = ledger
        .transition(call.id, CallStatus::Rejected, None)
        .await
        .unwrap();
    assert_eq!(call.status, CallStatus::Rejected);
    assert_eq!(call.end_reason, Some(EndReason::Rejected));
    assert!(call.connected_at.is_none());
    assert!(call.ended_at.is_some());
}

#[tokio::test]
async fn duplicate_hangup_is_reported_as_success() {
    let ledger = test_ledger().await;
    let call = ringing_call(&ledger).await;
    ledger
        .transition(call.id, CallStatus::Connected, None)
        .await
        .unwrap();

    let first = ledger
        .transition(call.id, CallStatus::Ended, Some(EndReason::Hangup))
        .await
        .unwrap();
    let second = ledger
        .transition(call.id, CallStatus::Ended, Some(EndReason::Hangup))
        .await
        .expect("double hangup must not escalate");

    assert_eq!(first.ended_at, second.ended_at);
    assert_eq!(first.end_reason, second.end_reason);
}

#[tokio::test]
async fn cross_terminal_transition_is_rejected() {
    let ledger = test_ledger().await;
    let call = ringing_call(&ledger).await;
    ledger
        .transition(call.id, CallStatus::Missed, None)
        .await
        .unwrap();

    let err = ledger
        .transition(call.id, CallStatus::Ended, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidTransition {
            from: CallStatus::Missed,
            to: CallStatus::Ended
        }
    ));

    let err = ledger
        .transition(call.id, CallStatus::Connected, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { .. }));
}

#[tokio::test]
async fn caller_cancel_is_ended_with_reason() {
    let ledger = test_ledger().await;
    let call = ringing_call(&ledger).await;

    let call = ledger
        .transition(call.id, CallStatus::Ended, Some(EndReason::CallerCancelled))
        .await
        .unwrap();
    assert_eq!(call.status, CallStatus::Ended);
    assert_eq!(call.end_reason, Some(EndReason::CallerCancelled));
    assert!(call.connected_at.is_none());
}

#[tokio::test]
async fn assign_receiver_rewrites_ringing_call() {
    let ledger = test_ledger().await;
    let call = ledger
        .create_call(Party::customer("cust-1"), Party::support_intake(), false)
        .await
        .unwrap();

    let call = ledger
        .assign_receiver(call.id, Party::admin("agent-7"))
        .await
        .unwrap();
    assert_eq!(call.receiver.id.as_str(), "agent-7");

    // Once connected the receiver is settled.
    ledger
        .transition(call.id, CallStatus::Connected, None)
        .await
        .unwrap();
    assert!(ledger
        .assign_receiver(call.id, Party::admin("agent-8"))
        .await
        .is_err());
}

#[tokio::test]
async fn active_calls_lists_only_non_terminal() {
    let ledger = test_ledger().await;
    let a = ringing_call(&ledger).await;
    let b = ledger
        .create_call(Party::customer("cust-9"), Party::partner("part-2"), false)
        .await
        .unwrap();
    ledger
        .transition(b.id, CallStatus::Rejected, None)
        .await
        .unwrap();

    let active = ledger.active_calls().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, a.id);
}

#[tokio::test]
async fn history_filters_by_status_and_name() {
    let ledger = test_ledger().await;
    let a = ringing_call(&ledger).await;
    ledger
        .transition(a.id, CallStatus::Missed, None)
        .await
        .unwrap();
    let b = ledger
        .create_call(Party::customer("cust-9"), Party::partner("part-2"), false)
        .await
        .unwrap();
    ledger
        .transition(b.id, CallStatus::Connected, None)
        .await
        .unwrap();
    ledger
        .transition(b.id, CallStatus::Ended, None)
        .await
        .unwrap();

    let missed = ledger
        .history(&CallFilter {
            status: Some(CallStatus::Missed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(missed.len(), 1);
    assert_eq!(missed[0].id, a.id);

    // Name search hits the directory-resolved display name.
    let by_name = ledger
        .history(&CallFilter {
            party_name: Some("lakeside".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].id, b.id);

    let none = ledger
        .history(&CallFilter {
            party_name: Some("nobody".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn feed_publishes_creation_and_transitions() {
    let ledger = test_ledger().await;
    let mut rx = ledger.subscribe();

    let call = ringing_call(&ledger).await;
    ledger
        .transition(call.id, CallStatus::Connected, None)
        .await
        .unwrap();

    let created = rx.recv().await.unwrap();
    assert_eq!(created.call.id, call.id);
    assert!(matches!(created.change, CallChange::Created));

    let connected = rx.recv().await.unwrap();
    assert!(connected.is_connected());
    assert!(connected.call.connected_at.is_some());
}

/// Seeded random attempt sequences against the real ledger: the timestamp
/// invariants must hold no matter which attempts are accepted or rejected.
#[tokio::test]
async fn random_transition_sequences_preserve_invariants() {
    let statuses = [
        CallStatus::Ringing,
        CallStatus::Connected,
        CallStatus::Ended,
        CallStatus::Rejected,
        CallStatus::Missed,
    ];

    for seed in 0..20u64 {
        let ledger = test_ledger().await;
        let call = ringing_call(&ledger).await;
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut ever_connected = false;

        for _ in 0..15 {
            let to = statuses[rng.gen_range(0..statuses.len())];
            if let Ok(updated) = ledger.transition(call.id, to, None).await {
                if updated.status == CallStatus::Connected {
                    ever_connected = true;
                }
            }
        }

        let final_call = ledger.find(call.id).await.unwrap().unwrap();
        assert_eq!(
            final_call.connected_at.is_some(),
            ever_connected,
            "seed {seed}: connected_at must track connection"
        );
        assert_eq!(
            final_call.ended_at.is_some(),
            final_call.status.is_terminal(),
            "seed {seed}: ended_at must track terminality"
        );
        if matches!(final_call.status, CallStatus::Rejected | CallStatus::Missed) {
            assert!(final_call.connected_at.is_none(), "seed {seed}");
        }
    }
}
