//! Call change feed.
//!
//! Every insert and status update the ledger performs is published here.
//! The feed is the only way other components observe status changes; nothing
//! polls the store. Consumers that fall behind see `Lagged` and are expected
//! to resync from the ledger.

use tokio::sync::broadcast;
use tracing::trace;

use crate::call::Call;
use crate::types::CallStatus;

/// What changed about a call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallChange {
    /// A new call row was inserted (always in `ringing`).
    Created,
    /// Status moved `from` -> `to`.
    Status { from: CallStatus, to: CallStatus },
    /// The receiver leg was rewritten at queue assignment.
    ReceiverAssigned,
}

/// One change feed event: the call after the change, plus what changed.
#[derive(Debug, Clone)]
pub struct CallEvent {
    pub call: Call,
    pub change: CallChange,
}

impl CallEvent {
    /// Whether this event is a transition into a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.change, CallChange::Status { to, .. } if to.is_terminal())
    }

    /// Whether this event is the transition into `connected`.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.change,
            CallChange::Status {
                to: CallStatus::Connected,
                ..
            }
        )
    }
}

/// Broadcast fan-out of [`CallEvent`]s.
#[derive(Debug, Clone)]
pub struct CallFeed {
    tx: broadcast::Sender<CallEvent>,
}

impl CallFeed {
    /// Create a feed with the given per-subscriber buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future call events.
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. A feed with no subscribers drops events silently.
    pub fn publish(&self, event: CallEvent) {
        let receivers = self.tx.receiver_count();
        trace!(
            "Publishing {:?} for call {} to {} subscriber(s)",
            event.change,
            event.call.id,
            receivers
        );
        let _ = self.tx.send(event);
    }
}

impl Default for CallFeed {
    fn default() -> Self {
        Self::new(256)
    }
}
