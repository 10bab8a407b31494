//! Signaling message envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use roadcall_call_ledger::{CallId, PartyId};

/// Kind of negotiation payload being relayed.
///
/// Offers and answers are singletons per call; candidates are additive and
/// commutative, so duplicate delivery is always safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Candidate => "candidate",
        }
    }
}

/// One relayed negotiation message. The payload is opaque to the relay;
/// it is produced by one party, consumed by the other, and discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEnvelope {
    pub call_id: CallId,
    pub from_party: PartyId,
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub payload: Value,
}

impl SignalEnvelope {
    pub fn new(call_id: CallId, from_party: PartyId, kind: SignalKind, payload: Value) -> Self {
        Self {
            call_id,
            from_party,
            kind,
            payload,
        }
    }
}
