//! Call orchestration.
//!
//! Coordinates the ledger, relay, queue, and per-channel policies for the
//! three call channels. Each call's lifecycle is handled by independent
//! tasks that only meet inside the ledger's transition CAS and the queue's
//! assignment critical section.

pub mod core;

pub use core::CallOrchestrator;
