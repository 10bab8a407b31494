use thiserror::Error;

/// Media archive errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Archival encode failed
    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    /// Object storage read/write failed
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Recording exists but is not in `ready`
    #[error("Recording not ready: {0}")]
    NotReady(String),

    /// Requester lacks administrative authorization
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Recording not found
    #[error("Recording not found: {0}")]
    NotFound(String),

    /// Status change would violate the monotonic recording lifecycle
    #[error("Invalid recording state: {0}")]
    InvalidState(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl ArchiveError {
    /// Create a new EncodeFailed error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::EncodeFailed(msg.into())
    }

    /// Create a new ObjectStore error
    pub fn object_store<S: Into<String>>(msg: S) -> Self {
        Self::ObjectStore(msg.into())
    }

    /// Create a new NotReady error
    pub fn not_ready<S: Into<String>>(msg: S) -> Self {
        Self::NotReady(msg.into())
    }

    /// Create a new Forbidden error
    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Create a new NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new InvalidState error
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Self::InvalidState(msg.into())
    }
}

/// Result type for media archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;
