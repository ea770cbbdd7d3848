//! Attest Agent - drives HTTP services under journal provenance
//!
//! The agent performs synchronous HTTP operations against one base URL
//! and records every exchange: the (scrubbed) request and response of
//! each call become message records in an attached journal, and both
//! the agent and its responses export into the snapshot graph.
//!
//! Transport failures are data, not panics: a refused connection or
//! timed-out read degrades to an [`HttpResponse`] carrying the error.
//!
//! # Example
//!
//! ```rust,ignore
//! use attest_agent::HttpAgent;
//!
//! let mut agent = HttpAgent::new("http://localhost:8080")?;
//! agent.attach_journal(journal.clone());
//!
//! let response = agent.get("/health")?;
//! response.check_ok()?;
//! ```

mod error;
mod http;
mod scrub;

pub use error::{Error, Result};
pub use http::{HttpAgent, HttpResponse};
pub use scrub::{HttpScrubber, NoopScrubber, SecretScrubber};
