//! # Call Engine
//!
//! Orchestration layer of the roadcall voice core. Coordinates the call
//! ledger, signaling relay, support queue, and recorder for the three call
//! channels (customer→partner, customer→support, partner→support), and
//! exposes the administrative surface the marketplace's admin tooling
//! consumes.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 CallEngine                   │
//! ├──────────────┬───────────────┬───────────────┤
//! │ Orchestrator │  LiveMonitor  │   AdminApi    │
//! ├──────────────┴───────┬───────┴───────────────┤
//! │   QueueManager       │   policies (credit)   │
//! ├──────────────────────┴───────────────────────┤
//! │  call-ledger   signal-relay   media-archive  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Components coordinate exclusively through the ledger's change feed and
//! the queue's assignment critical section; there is no other shared
//! mutable state.

pub mod agent;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod orchestrator;
pub mod policy;
pub mod queue;

pub use agent::{Agent, AgentId, AgentStatus};
pub use api::AdminApi;
pub use config::{EngineConfig, GeneralConfig, QueueConfig, RecordingConfig};
pub use engine::{CallEngine, CallEngineBuilder};
pub use error::{EngineError, Result};
pub use monitor::LiveMonitor;
pub use orchestrator::CallOrchestrator;
pub use policy::{
    CallPolicy, CreditAuthority, DirectCallPolicy, SupportCallPolicy, UnlimitedCredit,
};
pub use queue::{Assignment, QueueEntry, QueueManager, QueueStats};

/// Convenience re-exports from the sibling crates.
pub mod prelude {
    pub use super::*;
    pub use roadcall_call_ledger::{
        Call, CallFilter, CallId, CallLedger, CallStatus, EndReason, Party, PartyId, PartyKind,
    };
    pub use roadcall_media_archive::{PlaybackGateway, Recording, RecordingStatus, SignedUrl};
    pub use roadcall_signal_relay::{Delivery, SignalEnvelope, SignalKind, SignalRelay};
}
