//! The call ledger: single source of truth for call status.
//!
//! All status writes in the voice core go through [`CallLedger::transition`].
//! Transitions for one call are linearized by a compare-and-set on the
//! previous status; a lost race revalidates against fresh state and either
//! retries or fails with `InvalidTransition`, so no interleaving can produce
//! an illegal status sequence.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::call::{Call, CallFilter};
use crate::directory::Directory;
use crate::error::{LedgerError, Result};
use crate::feed::{CallChange, CallEvent, CallFeed};
use crate::store::calls::InsertOutcome;
use crate::store::CallStore;
use crate::types::{CallId, CallStatus, EndReason, Party};

/// How many CAS attempts a transition makes before giving up. Two racing
/// writers resolve on the second pass; more retries than that means the
/// state is churning illegally.
const TRANSITION_ATTEMPTS: u32 = 3;

/// Call ledger and state machine.
pub struct CallLedger {
    store: CallStore,
    feed: CallFeed,
    directory: Arc<dyn Directory>,
}

impl CallLedger {
    pub fn new(store: CallStore, directory: Arc<dyn Directory>) -> Self {
        Self {
            store,
            feed: CallFeed::default(),
            directory,
        }
    }

    /// Subscribe to the change feed.
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.feed.subscribe()
    }

    /// The underlying store handle (shared pool access for sibling stores).
    pub fn store(&self) -> &CallStore {
        &self.store
    }

    /// Create a call in `ringing`.
    ///
    /// Enforces the one-active-call-per-party rule on both legs; the shared
    /// support intake party is exempt on the receiver side so any number of
    /// callers can wait for an agent.
    pub async fn create_call(
        &self,
        caller: Party,
        receiver: Party,
        is_recorded: bool,
    ) -> Result<Call> {
        if caller.id == receiver.id {
            return Err(LedgerError::SelfCallNotAllowed);
        }

        let caller_name = self.resolve_name(&caller).await;
        let receiver_name = self.resolve_name(&receiver).await;
        let check_receiver = !receiver.is_support_intake();

        let call = Call {
            id: CallId::new(),
            caller,
            caller_name,
            receiver,
            receiver_name,
            status: CallStatus::Ringing,
            started_at: Utc::now(),
            connected_at: None,
            ended_at: None,
            end_reason: None,
            is_recorded,
            recording_id: None,
        };

        match self.store.insert_call_checked(&call, check_receiver).await? {
            InsertOutcome::Inserted => {}
            InsertOutcome::CallerBusy => {
                return Err(LedgerError::caller_busy(call.caller.id.as_str()));
            }
            InsertOutcome::ReceiverBusy => {
                return Err(LedgerError::receiver_unavailable(call.receiver.id.as_str()));
            }
        }
        info!(
            "📞 Call {} created: {} -> {} (recorded: {})",
            call.id, call.caller, call.receiver, call.is_recorded
        );

        self.feed.publish(CallEvent {
            call: call.clone(),
            change: CallChange::Created,
        });

        Ok(call)
    }

    /// Apply a status transition.
    ///
    /// Repeating the terminal transition a call already took is an
    /// idempotent no-op reported as success (tolerated double hangup); any
    /// other transition out of a terminal state is `InvalidTransition`.
    pub async fn transition(
        &self,
        call_id: CallId,
        to: CallStatus,
        reason: Option<EndReason>,
    ) -> Result<Call> {
        for attempt in 0..TRANSITION_ATTEMPTS {
            let call = self.require(call_id).await?;
            let from = call.status;

            if from == to && from.is_terminal() {
                debug!("Call {} already {}, treating repeat as no-op", call_id, to);
                return Ok(call);
            }

            if !from.can_transition_to(to) {
                return Err(LedgerError::InvalidTransition { from, to });
            }

            let now = Utc::now();
            let connected_at = (to == CallStatus::Connected).then_some(now);
            let ended_at = to.is_terminal().then_some(now);
            let end_reason = if to.is_terminal() {
                Some(reason.unwrap_or(default_reason(to)))
            } else {
                None
            };

            let applied = self
                .store
                .cas_status(call_id, from, to, connected_at, ended_at, end_reason)
                .await?;

            if !applied {
                // Lost the race to a concurrent transition; revalidate.
                debug!(
                    "Call {} transition {} -> {} lost CAS (attempt {})",
                    call_id, from, to, attempt
                );
                continue;
            }

            let updated = self.require(call_id).await?;
            info!("🔄 Call {} status: {} -> {}", call_id, from, to);

            self.feed.publish(CallEvent {
                call: updated.clone(),
                change: CallChange::Status { from, to },
            });

            return Ok(updated);
        }

        // CAS kept failing; report against the freshest state we can see.
        let call = self.require(call_id).await?;
        warn!(
            "Call {} transition to {} abandoned after {} attempts (now {})",
            call_id, to, TRANSITION_ATTEMPTS, call.status
        );
        Err(LedgerError::InvalidTransition {
            from: call.status,
            to,
        })
    }

    /// Rewrite the receiver of a ringing support call at queue assignment.
    pub async fn assign_receiver(&self, call_id: CallId, receiver: Party) -> Result<Call> {
        let receiver_name = self.resolve_name(&receiver).await;

        let applied = self
            .store
            .update_receiver(call_id, &receiver, &receiver_name)
            .await?;
        if !applied {
            let call = self.require(call_id).await?;
            return Err(LedgerError::InvalidTransition {
                from: call.status,
                to: call.status,
            });
        }

        let updated = self.require(call_id).await?;
        info!("Call {} receiver assigned: {}", call_id, updated.receiver);

        self.feed.publish(CallEvent {
            call: updated.clone(),
            change: CallChange::ReceiverAssigned,
        });

        Ok(updated)
    }

    /// Record the archival recording row linked to this call.
    pub async fn link_recording(&self, call_id: CallId, recording_id: &str) -> Result<()> {
        if !self.store.set_recording_id(call_id, recording_id).await? {
            return Err(LedgerError::not_found(call_id.to_string()));
        }
        Ok(())
    }

    /// All calls in `ringing` or `connected`.
    pub async fn active_calls(&self) -> Result<Vec<Call>> {
        Ok(self.store.active_calls().await?)
    }

    /// Historical calls for the administrative surface.
    pub async fn history(&self, filter: &CallFilter) -> Result<Vec<Call>> {
        Ok(self.store.history(filter).await?)
    }

    /// Fetch a call by id.
    pub async fn find(&self, call_id: CallId) -> Result<Option<Call>> {
        Ok(self.store.find(call_id).await?)
    }

    async fn require(&self, call_id: CallId) -> Result<Call> {
        self.find(call_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(call_id.to_string()))
    }

    async fn resolve_name(&self, party: &Party) -> String {
        self.directory
            .display_name(&party.id)
            .await
            .unwrap_or_else(|| party.id.as_str().to_string())
    }
}

/// Reason recorded when the transition caller did not supply one.
fn default_reason(to: CallStatus) -> EndReason {
    match to {
        CallStatus::Rejected => EndReason::Rejected,
        CallStatus::Missed => EndReason::NoAnswer,
        _ => EndReason::Hangup,
    }
}
