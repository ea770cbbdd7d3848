//! Attest Core - provenance primitives for contract testing
//!
//! This crate provides the building blocks the rest of the harness
//! records its evidence with:
//! - An injectable time capability (`Clock`, `SystemClock`, `StepClock`)
//! - Self-delimiting record-stream framing (`RecordWriter`, `RecordReader`)
//! - A snapshot graph model for exporting arbitrary domain objects
//!   (`JsonSnapshot`, `SnapshotEntity`, `EdgeBuilder`, `Relation`)
//!
//! ## Snapshot Graph
//!
//! Any type implementing [`JsonSnapshotable`] can be materialized into a
//! directed graph of entities and labeled edges, which serializes to one
//! deterministic JSON document:
//!
//! ```rust,ignore
//! use attest_core::{JsonSnapshot, JsonSnapshotable};
//!
//! let mut snapshot = JsonSnapshot::new();
//! snapshot.add_data(&my_object)?;
//! let document = snapshot.to_json_object();
//! ```
//!
//! ## Record Streams
//!
//! Records are pretty-printed JSON values written back-to-back with no
//! separator. The reader recovers record boundaries by scanning one
//! balanced JSON value at a time, so a stream of records is both
//! machine-parseable and human-readable.

mod clock;
mod error;
pub mod record;
pub mod snapshot;

pub use clock::{Clock, StepClock, SystemClock};
pub use error::{Error, Result};
pub use record::{RecordReader, RecordWriter};
pub use snapshot::{
    determine_valid_relation, object_count_to_summary, Edge, EdgeBuilder, EdgeValue, EntityId,
    JsonSnapshot, JsonSnapshotable, Relation, SnapshotEntity, Validity,
};
