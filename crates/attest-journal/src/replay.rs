//! Replay of stored journal streams
//!
//! Reads a persisted stream back into parsed record views, preserving
//! write order and the raw text of every record. This is the round-trip
//! surface only; querying and analytics over stored journals are out of
//! scope.

use attest_core::RecordReader;
use serde_json::{Map, Value};
use std::io::Read;

use crate::journal::{RESERVED_KEYS, THREAD_KEY, TIMESTAMP_KEY, TYPE_KEY, VALUE_KEY};
use crate::{Error, Result};

/// One parsed record from a stored journal
#[derive(Debug, Clone)]
pub struct JournalRecord {
    raw: String,
    fields: Map<String, Value>,
}

impl JournalRecord {
    /// Parse one record text
    pub fn parse(raw: String) -> Result<Self> {
        let value: Value = serde_json::from_str(&raw)
            .map_err(|err| Error::MalformedRecord(err.to_string()))?;
        match value {
            Value::Object(fields) => Ok(Self { raw, fields }),
            other => Err(Error::MalformedRecord(format!(
                "record is not a JSON object: {other}"
            ))),
        }
    }

    /// The record text exactly as stored
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The `_type` tag
    pub fn record_type(&self) -> Option<&str> {
        self.fields.get(TYPE_KEY).and_then(Value::as_str)
    }

    /// The clock value recorded at write time
    pub fn timestamp(&self) -> Option<f64> {
        self.fields.get(TIMESTAMP_KEY).and_then(Value::as_f64)
    }

    /// The writer identity recorded at write time
    pub fn thread(&self) -> Option<&str> {
        self.fields.get(THREAD_KEY).and_then(Value::as_str)
    }

    /// The message text of a message record
    pub fn value(&self) -> Option<&str> {
        self.fields.get(VALUE_KEY).and_then(Value::as_str)
    }

    /// Whether this is a message record
    pub fn is_message(&self) -> bool {
        self.record_type() == Some(crate::journal::MESSAGE_TYPE)
    }

    /// Whether this is a snapshot record
    pub fn is_snapshot(&self) -> bool {
        self.record_type() == Some(crate::journal::SNAPSHOT_TYPE)
    }

    /// Any top-level field by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Caller metadata: every top-level field except the reserved keys
    pub fn metadata(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
    }
}

/// Iterator over the records of a stored journal stream
///
/// Lazy, finite and non-restartable, like the underlying record reader.
pub struct JournalReplay<R: Read> {
    records: RecordReader<R>,
}

impl<R: Read> JournalReplay<R> {
    /// Replay the stream in `source`
    pub fn new(source: R) -> Self {
        Self {
            records: RecordReader::new(source),
        }
    }
}

impl<R: Read> Iterator for JournalReplay<R> {
    type Item = Result<JournalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.records.next()? {
            Ok(text) => Some(JournalRecord::parse(text)),
            Err(err) => Some(Err(Error::Io(err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Journal, Metadata, SharedBuffer};
    use attest_core::StepClock;
    use serde_json::json;
    use std::fs::File;
    use std::io::Write as _;
    use std::sync::Arc;

    #[test]
    fn test_replay_round_trips_written_records() {
        let buffer = SharedBuffer::new();
        let journal = Journal::new(Arc::new(StepClock::new(1.23, 0.01)));
        journal.open(buffer.clone()).unwrap();

        let mut metadata = Metadata::new();
        metadata.insert("probe".to_string(), json!("health"));
        journal.write_message_with("checking", metadata).unwrap();
        journal.terminate().unwrap();

        let records: Vec<JournalRecord> = JournalReplay::new(buffer.contents().as_bytes())
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(JournalRecord::is_message));
        assert_eq!(records[1].get("probe"), Some(&json!("health")));
        // The raw text round-trips to the identical stream.
        let rebuilt: String = records.iter().map(JournalRecord::raw).collect();
        assert_eq!(rebuilt, buffer.contents());
    }

    #[test]
    fn test_replay_from_a_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.journal");

        let journal = Journal::new(Arc::new(StepClock::new(1.23, 0.01)));
        journal.open(File::create(&path).unwrap()).unwrap();
        journal.write_message("persisted").unwrap();
        journal.terminate().unwrap();

        let records: Vec<JournalRecord> = JournalReplay::new(File::open(&path).unwrap())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].value(), Some("persisted"));
        assert_eq!(records[1].timestamp(), Some(1.24));
    }

    #[test]
    fn test_malformed_record_is_an_error() {
        let err = JournalRecord::parse("[1, 2, 3]".to_string()).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));

        let err = JournalRecord::parse("{broken".to_string()).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
    }

    #[test]
    fn test_metadata_excludes_reserved_keys() {
        let record = JournalRecord::parse(
            serde_json::to_string(&json!({
                "_type": "JournalMessage",
                "_value": "x",
                "_timestamp": 1.0,
                "_thread": "main",
                "custom": true
            }))
            .unwrap(),
        )
        .unwrap();

        let keys: Vec<&str> = record.metadata().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["custom"]);
    }

    #[test]
    fn test_replay_propagates_io_errors() {
        // A truncated container at the end of the stream.
        let mut stream = Vec::new();
        stream.write_all(b"{\"_type\": \"JournalMessage\"").unwrap();

        let mut replay = JournalReplay::new(stream.as_slice());
        assert!(matches!(replay.next(), Some(Err(Error::Io(_)))));
    }
}
