//! Per-call signaling relay.
//!
//! Delivers negotiation messages between exactly two parties identified by
//! a call id, with no persistence beyond delivery. Messages from one sender
//! reach the recipient in send order (one mpsc per subscriber); there is no
//! cross-sender ordering.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use roadcall_call_ledger::{CallEvent, CallId, PartyId};

use crate::envelope::SignalEnvelope;
use crate::error::{RelayError, Result};

/// Outcome of a send. A missing or saturated peer is not an error: signaling
/// is best-effort and the sender retries (offers/answers are singletons,
/// candidates additive, so duplicates are harmless).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the peer's subscription.
    Relayed,
    /// No subscribed peer; logged, sender retries.
    NoPeer,
}

struct Member {
    party: PartyId,
    tx: mpsc::Sender<SignalEnvelope>,
}

#[derive(Default)]
struct CallChannel {
    members: Vec<Member>,
}

/// Signaling relay hub, one logical channel per call.
pub struct SignalRelay {
    channels: DashMap<CallId, CallChannel>,
    closed: DashSet<CallId>,
    capacity: usize,
}

impl SignalRelay {
    /// Default per-subscriber buffer. Negotiation bursts are tens of
    /// candidates, not thousands.
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            closed: DashSet::new(),
            capacity,
        }
    }

    /// Open (or re-open) this party's subscription for a call.
    ///
    /// A second subscribe by the same party replaces the first stream, which
    /// covers client reconnects. A third distinct party is rejected: relay
    /// channels are strictly two-party.
    pub fn subscribe(
        &self,
        call_id: CallId,
        party: PartyId,
    ) -> Result<ReceiverStream<SignalEnvelope>> {
        if self.closed.contains(&call_id) {
            return Err(RelayError::Closed(call_id));
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        let mut channel = self.channels.entry(call_id).or_default();

        if let Some(member) = channel.members.iter_mut().find(|m| m.party == party) {
            debug!("Party {} re-subscribed to call {}", party, call_id);
            member.tx = tx;
        } else {
            if channel.members.len() >= 2 {
                return Err(RelayError::ChannelFull(call_id));
            }
            debug!("Party {} subscribed to call {}", party, call_id);
            channel.members.push(Member { party, tx });
        }

        Ok(ReceiverStream::new(rx))
    }

    /// Relay an envelope to the other participant of its call.
    pub fn send(&self, envelope: SignalEnvelope) -> Delivery {
        let call_id = envelope.call_id;

        if self.closed.contains(&call_id) {
            debug!(
                "Dropping {} from {} for closed call {}",
                envelope.kind.as_str(),
                envelope.from_party,
                call_id
            );
            return Delivery::NoPeer;
        }

        let Some(channel) = self.channels.get(&call_id) else {
            debug!(
                "Delivery miss: no channel for call {} ({} from {})",
                call_id,
                envelope.kind.as_str(),
                envelope.from_party
            );
            return Delivery::NoPeer;
        };

        let Some(peer) = channel
            .members
            .iter()
            .find(|m| m.party != envelope.from_party)
        else {
            debug!(
                "Delivery miss: peer not yet subscribed on call {} ({} from {})",
                call_id,
                envelope.kind.as_str(),
                envelope.from_party
            );
            return Delivery::NoPeer;
        };

        match peer.tx.try_send(envelope) {
            Ok(()) => Delivery::Relayed,
            Err(err) => {
                warn!("Delivery miss on call {}: {}", call_id, err);
                Delivery::NoPeer
            }
        }
    }

    /// Tear down a call's channel, ending all its subscriptions.
    pub fn close(&self, call_id: CallId) {
        self.closed.insert(call_id);
        if self.channels.remove(&call_id).is_some() {
            info!("Relay channel closed for call {}", call_id);
        }
    }

    /// Number of calls with an open channel.
    pub fn open_channels(&self) -> usize {
        self.channels.len()
    }

    /// Drive teardown from the ledger feed: any terminal transition closes
    /// the call's channel regardless of in-flight messages.
    pub fn spawn_driver(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<CallEvent>,
    ) -> JoinHandle<()> {
        let relay = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.is_terminal() => relay.close(event.call.id),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Relay driver lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Relay driver stopped: feed closed");
        })
    }
}

impl Default for SignalRelay {
    fn default() -> Self {
        Self::new()
    }
}
