use thiserror::Error;

use roadcall_call_ledger::CallId;

/// Signaling relay errors
#[derive(Error, Debug)]
pub enum RelayError {
    /// The call already reached a terminal state and its channel is gone
    #[error("Relay channel closed for call {0}")]
    Closed(CallId),

    /// A third party tried to join a two-party channel
    #[error("Call {0} already has two subscribed parties")]
    ChannelFull(CallId),
}

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
