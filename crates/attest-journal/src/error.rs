//! Error types for attest-journal

use thiserror::Error;

/// Journal error type
#[derive(Debug, Error)]
pub enum Error {
    /// The journal was opened twice
    #[error("journal is already open")]
    AlreadyOpen,

    /// A write was attempted before `open`
    #[error("journal is not open")]
    NotOpen,

    /// A write or open was attempted after `terminate`
    #[error("journal is closed")]
    Closed,

    /// Caller metadata collided with a reserved record key
    #[error("metadata key collides with reserved key: {0}")]
    ReservedKey(String),

    /// A stored record could not be parsed back
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Sink I/O failure; the affected record may be incomplete
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record construction failure
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Snapshot construction failure while storing an object
    #[error(transparent)]
    Snapshot(#[from] attest_core::Error),
}

/// Result type for journal operations
pub type Result<T> = std::result::Result<T, Error>;
