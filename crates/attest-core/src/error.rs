//! Error types for attest-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(u64),

    #[error("snapshot export failed for {subject}: {reason}")]
    SnapshotExport { subject: String, reason: String },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
