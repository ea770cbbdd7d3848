//! Attest Journal - append-only provenance for contract tests
//!
//! A journal serializes diagnostic messages and object snapshots into a
//! single self-delimiting stream of framed JSON records, safely under
//! concurrent writers. Every record carries the clock value and writer
//! identity at append time, so a stored stream is a complete,
//! replayable audit trail of one harness run.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use attest_core::SystemClock;
//! use attest_journal::{Journal, SharedBuffer};
//!
//! let journal = Journal::new(Arc::new(SystemClock));
//! journal.open(SharedBuffer::new())?;
//!
//! journal.write_message("probing /health")?;
//! journal.store(&result)?;
//!
//! journal.terminate()?;
//! ```

mod error;
mod journal;
mod replay;
mod sink;

pub use error::{Error, Result};
pub use journal::{
    thread_identity, Journal, Metadata, MESSAGE_TYPE, SNAPSHOT_TYPE, THREAD_KEY, TIMESTAMP_KEY,
    TYPE_KEY, VALUE_KEY,
};
pub use replay::{JournalRecord, JournalReplay};
pub use sink::{BoxSink, SharedBuffer};
