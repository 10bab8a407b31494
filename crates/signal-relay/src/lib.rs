//! # Signaling Relay
//!
//! Best-effort delivery of session-negotiation messages (offer, answer,
//! candidates) between the two parties of a call, before a direct media
//! path exists. Nothing is persisted beyond delivery; channels are torn
//! down when the ledger reports a terminal state.

pub mod envelope;
pub mod error;
pub mod relay;

pub use envelope::{SignalEnvelope, SignalKind};
pub use error::{RelayError, Result};
pub use relay::{Delivery, SignalRelay};
