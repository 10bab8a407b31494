//! # Call Ledger
//!
//! Single source of truth for call lifecycle in the roadcall voice core.
//! Owns the call table, enforces the legal transition table, and publishes
//! every change on a broadcast feed that the relay, recorder, and live
//! monitor consume instead of polling.
//!
//! ## Modules
//!
//! - [`types`]: call/party identifiers, status and end-reason enums
//! - [`call`]: the call record and history filter
//! - [`ledger`]: transition authority and creation rules
//! - [`store`]: sqlx/SQLite persistence
//! - [`feed`]: broadcast change feed
//! - [`directory`]: display-name lookup capability

pub mod call;
pub mod directory;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod store;
pub mod types;

pub use call::{Call, CallFilter};
pub use directory::{Directory, StaticDirectory};
pub use error::{LedgerError, Result};
pub use feed::{CallChange, CallEvent, CallFeed};
pub use ledger::CallLedger;
pub use store::CallStore;
pub use types::{CallId, CallStatus, EndReason, Party, PartyId, PartyKind};
