//! Error types for attest-agent

use thiserror::Error;

/// Agent error type
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client construction or protocol failure
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// A response failed `check_ok`
    #[error("unexpected HTTP response {code:?}: {body}")]
    UnexpectedResponse {
        code: Option<u16>,
        body: String,
    },

    /// Journaling an exchange failed; provenance is incomplete
    #[error(transparent)]
    Journal(#[from] attest_journal::Error),
}

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, Error>;
