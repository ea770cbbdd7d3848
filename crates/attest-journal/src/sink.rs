//! In-memory sink with shared contents

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Cloneable in-memory sink whose contents outlive the journal
///
/// All clones share one buffer. A test (or an embedding harness) keeps
/// one handle while the journal owns another, and can read the final
/// stream after the journal has terminated and released its copy.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents as UTF-8 text
    ///
    /// Journal streams are always valid UTF-8; foreign bytes are
    /// replaced rather than failing a diagnostic read.
    pub fn contents(&self) -> String {
        let bytes = self.lock();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Current contents as raw bytes
    pub fn bytes(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Number of bytes written so far
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Type-erased sink for callers that pick the backing store at runtime
pub type BoxSink = Box<dyn Write + Send>;
