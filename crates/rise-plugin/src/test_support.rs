//! In-memory channel doubles for driving framers and dispatchers in tests.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use serde_json::Value;

use crate::error::FrameError;
use crate::framing::{Duplex, FrameBoundary, Framer};

/// Reader that replays scripted chunks, one per `read` call.
///
/// A chunk longer than the caller's buffer is split across calls. Once the
/// script is exhausted every read reports end of stream.
#[derive(Debug, Default)]
pub struct ScriptedReader {
    script: VecDeque<Result<Vec<u8>, io::ErrorKind>>,
    reads: usize,
}

impl ScriptedReader {
    /// Creates a reader with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a chunk of bytes.
    #[must_use]
    pub fn chunk(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.script.push_back(Ok(bytes.into()));
        self
    }

    /// Queues a read error of the given kind.
    #[must_use]
    pub fn error(mut self, kind: io::ErrorKind) -> Self {
        self.script.push_back(Err(kind));
        self
    }

    /// Queues `document` serialised as one host command.
    #[must_use]
    pub fn command(self, document: &Value) -> Self {
        self.chunk(document.to_string())
    }

    /// Number of `read` calls served so far.
    #[must_use]
    pub const fn reads(&self) -> usize {
        self.reads
    }

    /// Number of scripted entries not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads += 1;
        let Some(next) = self.script.pop_front() else {
            return Ok(0);
        };
        let mut chunk = next.map_err(io::Error::from)?;
        if chunk.len() > buf.len() {
            let rest = chunk.split_off(buf.len());
            self.script.push_front(Ok(rest));
        }
        let len = chunk.len();
        if let Some(target) = buf.get_mut(..len) {
            target.copy_from_slice(&chunk);
        }
        Ok(len)
    }
}

/// Writer that records every byte and can simulate short or failing writes.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    written: Vec<u8>,
    writes: usize,
    max_write: Option<usize>,
    fail_with: Option<io::ErrorKind>,
}

impl RecordingWriter {
    /// Creates a writer that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of bytes accepted by each write call.
    #[must_use]
    pub const fn accepting_at_most(mut self, max_write: usize) -> Self {
        self.max_write = Some(max_write);
        self
    }

    /// Makes every write fail with `kind`.
    #[must_use]
    pub const fn failing(mut self, kind: io::ErrorKind) -> Self {
        self.fail_with = Some(kind);
        self
    }

    /// Bytes accepted so far.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.written
    }

    /// Number of write calls made.
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }

    /// Reads the recorded bytes back the way a host would and parses each
    /// frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Decode`] when a recorded frame is not JSON.
    pub fn frames(&self) -> Result<Vec<Value>, FrameError> {
        let reader = ScriptedReader::new().chunk(self.written.clone());
        let mut framer = Framer::with_boundary(reader, FrameBoundary::Sentinel);
        let mut frames = Vec::new();
        loop {
            match framer.read_document() {
                Ok(document) => frames.push(document),
                Err(FrameError::StreamClosed) => return Ok(frames),
                Err(error) => return Err(error),
            }
        }
    }
}

impl Write for RecordingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes += 1;
        if let Some(kind) = self.fail_with {
            return Err(io::Error::from(kind));
        }
        let accepted = self.max_write.map_or(buf.len(), |max| buf.len().min(max));
        if let Some(bytes) = buf.get(..accepted) {
            self.written.extend_from_slice(bytes);
        }
        Ok(accepted)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory duplex channel used by dispatcher tests.
pub type MemoryChannel = Duplex<ScriptedReader, RecordingWriter>;

/// Builds a channel that replays `reader` and records into a fresh writer.
#[must_use]
pub fn memory_channel(reader: ScriptedReader) -> MemoryChannel {
    Duplex::new(reader, RecordingWriter::new())
}
