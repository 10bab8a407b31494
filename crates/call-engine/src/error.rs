use thiserror::Error;

/// Call engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Ledger errors (creation rules, transitions)
    #[error("Ledger error: {0}")]
    Ledger(#[from] roadcall_call_ledger::LedgerError),

    /// Signaling relay errors
    #[error("Relay error: {0}")]
    Relay(#[from] roadcall_signal_relay::RelayError),

    /// Recording and playback errors
    #[error("Archive error: {0}")]
    Archive(#[from] roadcall_media_archive::ArchiveError),

    /// The paying party cannot cover the lead price
    #[error("Insufficient credit: {0}")]
    InsufficientCredit(String),

    /// Queue-related errors
    #[error("Queue error: {0}")]
    Queue(String),

    /// Agent-related errors
    #[error("Agent error: {0}")]
    Agent(String),

    /// Requester lacks administrative authorization
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Create a new InsufficientCredit error
    pub fn insufficient_credit<S: Into<String>>(msg: S) -> Self {
        Self::InsufficientCredit(msg.into())
    }

    /// Create a new Queue error
    pub fn queue<S: Into<String>>(msg: S) -> Self {
        Self::Queue(msg.into())
    }

    /// Create a new Agent error
    pub fn agent<S: Into<String>>(msg: S) -> Self {
        Self::Agent(msg.into())
    }

    /// Create a new Forbidden error
    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Create a new NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type for call engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
