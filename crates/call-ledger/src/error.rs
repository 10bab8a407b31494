use thiserror::Error;

use crate::types::CallStatus;

/// Call ledger errors
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Attempted status change not legal from the current state
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: CallStatus, to: CallStatus },

    /// Caller and receiver are the same party
    #[error("Self call not allowed")]
    SelfCallNotAllowed,

    /// Receiver already participates in a non-terminal call
    #[error("Receiver unavailable: {0}")]
    ReceiverUnavailable(String),

    /// Caller already participates in a non-terminal call
    #[error("Caller busy: {0}")]
    CallerBusy(String),

    /// Call not found
    #[error("Call not found: {0}")]
    NotFound(String),

    /// Malformed input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl LedgerError {
    /// Create a new ReceiverUnavailable error
    pub fn receiver_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::ReceiverUnavailable(msg.into())
    }

    /// Create a new CallerBusy error
    pub fn caller_busy<S: Into<String>>(msg: S) -> Self {
        Self::CallerBusy(msg.into())
    }

    /// Create a new NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new InvalidInput error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;
