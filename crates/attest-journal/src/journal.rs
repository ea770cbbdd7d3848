//! Append-only journal of framed provenance records
//!
//! A journal owns one record-stream writer and one injected clock. Its
//! lifecycle is `UNOPENED -> OPEN -> CLOSED` (terminal): opening emits a
//! `Starting journal.` record before any caller write, terminating
//! emits a `Finished journal.` record and then releases the sink
//! exactly once, even when that final write fails.
//!
//! All operations take `&self`; one internal mutex serializes record
//! appends, so a single journal can be shared across worker threads and
//! two records never interleave their bytes.

use attest_core::{Clock, JsonSnapshot, JsonSnapshotable, RecordWriter};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Error, Result};

/// Reserved key holding the record type tag
pub const TYPE_KEY: &str = "_type";
/// Reserved key holding the message text
pub const VALUE_KEY: &str = "_value";
/// Reserved key holding the clock value at write time
pub const TIMESTAMP_KEY: &str = "_timestamp";
/// Reserved key holding the writer identity
pub const THREAD_KEY: &str = "_thread";

/// Type tag of message records
pub const MESSAGE_TYPE: &str = "JournalMessage";
/// Type tag of snapshot records
pub const SNAPSHOT_TYPE: &str = "JournalSnapshot";

pub(crate) const RESERVED_KEYS: [&str; 4] = [TYPE_KEY, VALUE_KEY, TIMESTAMP_KEY, THREAD_KEY];

/// Caller-supplied metadata merged into a record at the top level
pub type Metadata = IndexMap<String, Value>;

/// Identity of the calling thread as recorded under `_thread`
///
/// The thread name when one was set, otherwise the debug rendering of
/// its id. Stable for the lifetime of the thread.
pub fn thread_identity() -> String {
    let current = std::thread::current();
    match current.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", current.id()),
    }
}

enum State<W: Write> {
    Unopened,
    Open(RecordWriter<W>),
    Closed,
}

type CloseHook<W> = Box<dyn FnOnce(W) + Send>;

/// Append-only journal over a sink
///
/// `W` is the underlying sink; it is acquired at [`open`](Journal::open)
/// and guaranteed released on every exit path of
/// [`terminate`](Journal::terminate).
pub struct Journal<W: Write> {
    clock: Arc<dyn Clock>,
    state: Mutex<State<W>>,
    close_hook: Mutex<Option<CloseHook<W>>>,
}

impl<W: Write> Journal<W> {
    /// Create an unopened journal with an injected clock
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(State::Unopened),
            close_hook: Mutex::new(None),
        }
    }

    /// Install a hook receiving the sink when the journal releases it
    ///
    /// The hook runs at most once, at the end of `terminate`, after the
    /// `Finished journal.` record. Without a hook the sink is dropped.
    pub fn set_close_hook(&self, hook: impl FnOnce(W) + Send + 'static) {
        let mut slot = lock(&self.close_hook);
        *slot = Some(Box::new(hook));
    }

    /// Open the journal over `sink` and emit the `Starting journal.` record
    ///
    /// Fails if the journal was already opened or terminated. On a sink
    /// I/O failure the journal stays unopened and the sink is dropped.
    pub fn open(&self, sink: W) -> Result<()> {
        let mut state = lock(&self.state);
        match *state {
            State::Unopened => {}
            State::Open(_) => return Err(Error::AlreadyOpen),
            State::Closed => return Err(Error::Closed),
        }

        let mut writer = RecordWriter::new(sink);
        let record = self.message_record("Starting journal.", Metadata::new())?;
        writer.append(&record)?;
        *state = State::Open(writer);
        log::debug!("journal opened");
        Ok(())
    }

    /// Append a message record
    ///
    /// Valid only while open. Sink failures propagate immediately and
    /// are never retried; a silently dropped audit entry would corrupt
    /// provenance.
    pub fn write_message(&self, text: &str) -> Result<()> {
        self.write_message_with(text, Metadata::new())
    }

    /// Append a message record with caller metadata merged at top level
    ///
    /// A metadata key matching one of the reserved keys (`_type`,
    /// `_value`, `_timestamp`, `_thread`) is an error.
    pub fn write_message_with(&self, text: &str, metadata: Metadata) -> Result<()> {
        let record = self.message_record(text, metadata)?;
        self.append(&record)
    }

    /// Append a snapshot record for a snapshotable object
    ///
    /// Materializes a snapshot graph rooted at `data` and appends it as
    /// a single `JournalSnapshot` record tagged with timestamp and
    /// writer identity.
    pub fn store<T>(&self, data: &T) -> Result<()>
    where
        T: JsonSnapshotable + ?Sized,
    {
        let mut snapshot = JsonSnapshot::new();
        snapshot.add_data(data)?;

        let mut record = Map::new();
        record.insert(TYPE_KEY.to_string(), SNAPSHOT_TYPE.into());
        record.insert(TIMESTAMP_KEY.to_string(), self.clock.now().into());
        record.insert(THREAD_KEY.to_string(), thread_identity().into());
        match snapshot.to_json_object() {
            Value::Object(fields) => record.extend(fields),
            other => {
                return Err(Error::Serialization(format!(
                    "snapshot did not serialize to an object: {other}"
                )))
            }
        }

        let text = serde_json::to_string_pretty(&Value::Object(record))
            .map_err(|err| Error::Serialization(err.to_string()))?;
        self.append(&text)
    }

    /// Close the journal: emit `Finished journal.` and release the sink
    ///
    /// The sink is released exactly once, on every exit path, even when
    /// the final record write fails. Terminating an already-terminated
    /// journal is a no-op; terminating an unopened one is an error.
    /// Under concurrent calls a single winner performs the close.
    pub fn terminate(&self) -> Result<()> {
        let mut state = lock(&self.state);
        match *state {
            State::Closed => return Ok(()),
            State::Unopened => return Err(Error::NotOpen),
            State::Open(_) => {}
        }
        let State::Open(mut writer) = std::mem::replace(&mut *state, State::Closed) else {
            return Ok(());
        };
        drop(state);

        let write_result = self
            .message_record("Finished journal.", Metadata::new())
            .and_then(|record| writer.append(&record).map_err(Error::from));

        // Release the sink regardless of how the final write went.
        let sink = writer.into_inner();
        let hook = lock(&self.close_hook).take();
        match hook {
            Some(hook) => hook(sink),
            None => drop(sink),
        }
        log::debug!("journal terminated");
        write_result
    }

    fn append(&self, record: &str) -> Result<()> {
        let mut state = lock(&self.state);
        match &mut *state {
            State::Open(writer) => writer.append(record).map_err(Error::from),
            State::Unopened => Err(Error::NotOpen),
            State::Closed => Err(Error::Closed),
        }
    }

    fn message_record(&self, text: &str, metadata: Metadata) -> Result<String> {
        let mut record = Map::new();
        record.insert(TYPE_KEY.to_string(), MESSAGE_TYPE.into());
        record.insert(VALUE_KEY.to_string(), text.into());
        record.insert(TIMESTAMP_KEY.to_string(), self.clock.now().into());
        record.insert(THREAD_KEY.to_string(), thread_identity().into());
        for (key, value) in metadata {
            if RESERVED_KEYS.contains(&key.as_str()) {
                return Err(Error::ReservedKey(key));
            }
            record.insert(key, value);
        }
        serde_json::to_string_pretty(&Value::Object(record))
            .map_err(|err| Error::Serialization(err.to_string()))
    }
}

/// Lock, recovering from poisoning
///
/// A panicking writer must not wedge the journal: terminate still has
/// to run and release the sink.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
