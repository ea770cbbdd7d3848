//! Self-delimiting record-stream framing
//!
//! A record stream is a sequence of serialized JSON records sharing one
//! sink, written back-to-back with no separator between them. Because
//! every record is a balanced JSON value, the boundary of each record
//! can be recovered by tracking string-literal escaping and
//! brace/bracket nesting depth - no external delimiter is needed, and
//! pretty-printed records stay directly human-readable on disk.
//!
//! Invariant: appending N records and reading the stream back yields
//! the same N texts in the same order, byte for byte.

use std::io::{self, BufReader, Bytes, Read, Write};
use std::iter::Peekable;

/// Writer half of a record stream
///
/// Appends already-serialized record texts to the sink. Mutual
/// exclusion across writers is the caller's responsibility; the journal
/// wraps one of these in a mutex.
#[derive(Debug)]
pub struct RecordWriter<W: Write> {
    sink: W,
}

impl<W: Write> RecordWriter<W> {
    /// Create a writer over `sink`
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Append exactly one serialized record
    ///
    /// The text is written as-is with no added delimiter, and the sink
    /// is flushed so the record is durable once this call returns.
    pub fn append(&mut self, record: &str) -> io::Result<()> {
        self.sink.write_all(record.as_bytes())?;
        self.sink.flush()
    }

    /// Release the underlying sink
    ///
    /// Every `append` flushes, so the sink holds all appended records.
    pub fn into_inner(self) -> W {
        self.sink
    }
}

/// Reader half of a record stream
///
/// A lazy, finite, non-restartable iterator over the record texts of a
/// stream. Each item is the raw substring of one balanced JSON value;
/// the text is never reinterpreted or reformatted, so callers choose
/// when and whether to parse it. Whitespace between records is skipped
/// and not returned.
pub struct RecordReader<R: Read> {
    bytes: Peekable<Bytes<BufReader<R>>>,
}

impl<R: Read> RecordReader<R> {
    /// Create a reader over `source`
    pub fn new(source: R) -> Self {
        Self {
            bytes: BufReader::new(source).bytes().peekable(),
        }
    }

    fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        match self.bytes.peek() {
            None => Ok(None),
            Some(Ok(byte)) => Ok(Some(*byte)),
            Some(Err(_)) => match self.bytes.next() {
                Some(Err(err)) => Err(err),
                _ => Ok(None),
            },
        }
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        self.bytes.next().transpose()
    }

    /// Scan the next balanced JSON value off the stream
    fn next_record(&mut self) -> io::Result<Option<String>> {
        // Skip inter-record whitespace.
        loop {
            match self.peek_byte()? {
                None => return Ok(None),
                Some(byte) if byte.is_ascii_whitespace() => {
                    self.next_byte()?;
                }
                Some(_) => break,
            }
        }

        let mut buf = Vec::new();
        let first = match self.next_byte()? {
            None => return Ok(None),
            Some(byte) => byte,
        };
        buf.push(first);

        match first {
            b'{' | b'[' => self.scan_container(&mut buf)?,
            b'"' => self.scan_string(&mut buf)?,
            _ => self.scan_scalar(&mut buf)?,
        }

        String::from_utf8(buf)
            .map(Some)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    /// Consume bytes until the opening brace/bracket is balanced
    fn scan_container(&mut self, buf: &mut Vec<u8>) -> io::Result<()> {
        let mut depth: u64 = 1;
        let mut in_string = false;
        let mut escaped = false;

        while depth > 0 {
            let byte = match self.next_byte()? {
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "truncated record",
                    ))
                }
                Some(byte) => byte,
            };
            buf.push(byte);

            if in_string {
                if escaped {
                    escaped = false;
                } else if byte == b'\\' {
                    escaped = true;
                } else if byte == b'"' {
                    in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => in_string = true,
                b'{' | b'[' => depth += 1,
                b'}' | b']' => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    /// Consume bytes until the closing quote of a top-level string
    fn scan_string(&mut self, buf: &mut Vec<u8>) -> io::Result<()> {
        let mut escaped = false;
        loop {
            let byte = match self.next_byte()? {
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "truncated record",
                    ))
                }
                Some(byte) => byte,
            };
            buf.push(byte);
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                return Ok(());
            }
        }
    }

    /// Consume a bare scalar (number, `true`, `false`, `null`) up to the
    /// next whitespace or structural byte
    fn scan_scalar(&mut self, buf: &mut Vec<u8>) -> io::Result<()> {
        loop {
            match self.peek_byte()? {
                None => return Ok(()),
                Some(byte)
                    if byte.is_ascii_whitespace()
                        || matches!(byte, b'{' | b'[' | b'"') =>
                {
                    return Ok(())
                }
                Some(_) => {
                    if let Some(byte) = self.next_byte()? {
                        buf.push(byte);
                    }
                }
            }
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
