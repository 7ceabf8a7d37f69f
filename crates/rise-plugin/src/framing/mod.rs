//! Byte framing for the host channel.
//!
//! Outbound frames are compact JSON immediately followed by the [`SENTINEL`].
//! Inbound frames are read in [`READ_CHUNK_SIZE`] chunks. The host never
//! writes a length prefix, so a frame ends at the first of:
//!
//! - a sentinel outside any JSON string in the accumulated bytes (bytes
//!   after it are kept for the next frame);
//! - a chunk shorter than the buffer, when reading with
//!   [`FrameBoundary::ShortRead`];
//! - end of stream after at least one byte.
//!
//! End of stream before any byte is [`FrameError::StreamClosed`]. A frame is
//! never parsed before its boundary is observed. Sentinel bytes inside a
//! string value are payload, so `{"text":"<<END>>"}` is one frame.

use std::io::{self, Read, Write};
use std::mem;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::FrameError;

const FRAMING_TARGET: &str = "rise_plugin::framing";

/// Token terminating every outbound frame.
pub const SENTINEL: &[u8] = b"<<END>>";

/// Capacity of the inbound read buffer.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Rule deciding where an inbound frame ends when no sentinel is present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameBoundary {
    /// A chunk shorter than [`READ_CHUNK_SIZE`] ends the frame. Hosts write
    /// each command in one call, so this is the plugin-side default.
    #[default]
    ShortRead,
    /// Only the sentinel or end of stream ends the frame. Used when reading
    /// plugin replies, which may arrive split across chunks or packed several
    /// to a chunk.
    Sentinel,
}

/// Reads and writes complete frames over a byte channel.
#[derive(Debug)]
pub struct Framer<C> {
    channel: C,
    boundary: FrameBoundary,
    pending: Vec<u8>,
    scan: SentinelScan,
}

impl<C> Framer<C> {
    /// Wraps `channel` using the [`FrameBoundary::ShortRead`] rule.
    #[must_use]
    pub const fn new(channel: C) -> Self {
        Self::with_boundary(channel, FrameBoundary::ShortRead)
    }

    /// Wraps `channel` using an explicit boundary rule.
    #[must_use]
    pub const fn with_boundary(channel: C, boundary: FrameBoundary) -> Self {
        Self {
            channel,
            boundary,
            pending: Vec::new(),
            scan: SentinelScan::new(),
        }
    }

    /// Returns the boundary rule in force.
    #[must_use]
    pub const fn boundary(&self) -> FrameBoundary {
        self.boundary
    }

    /// Borrows the underlying channel.
    #[must_use]
    pub const fn get_ref(&self) -> &C {
        &self.channel
    }

    /// Mutably borrows the underlying channel.
    pub const fn get_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Releases the underlying channel, discarding any buffered bytes.
    #[must_use]
    pub fn into_inner(self) -> C {
        self.channel
    }
}

impl<C: Read> Framer<C> {
    /// Reads the bytes of the next complete frame, without the sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Read`] when the channel fails and
    /// [`FrameError::StreamClosed`] when it ends before any byte arrives.
    pub fn read_frame(&mut self) -> Result<Vec<u8>, FrameError> {
        loop {
            if let Some(frame) = self.split_at_sentinel() {
                return Ok(frame);
            }

            let mut buffer = [0_u8; READ_CHUNK_SIZE];
            let read = match self.channel.read(&mut buffer) {
                Ok(read) => read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(FrameError::Read {
                        source: Arc::new(source),
                    });
                }
            };
            trace!(target: FRAMING_TARGET, read, "read chunk");

            if read == 0 {
                if self.pending.is_empty() {
                    return Err(FrameError::StreamClosed);
                }
                debug!(
                    target: FRAMING_TARGET,
                    bytes = self.pending.len(),
                    "end of stream terminated frame"
                );
                return Ok(self.take_pending());
            }

            if let Some(chunk) = buffer.get(..read) {
                self.pending.extend_from_slice(chunk);
            }

            if self.boundary == FrameBoundary::ShortRead && read < READ_CHUNK_SIZE {
                if let Some(frame) = self.split_at_sentinel() {
                    return Ok(frame);
                }
                return Ok(self.take_pending());
            }
        }
    }

    /// Reads the next frame and parses it as JSON after sanitisation.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::read_frame`] failures and returns
    /// [`FrameError::Decode`] when the sanitised text is not JSON.
    pub fn read_document(&mut self) -> Result<Value, FrameError> {
        let frame = self.read_frame()?;
        decode_frame(&frame)
    }

    fn split_at_sentinel(&mut self) -> Option<Vec<u8>> {
        let end = self.scan.advance(&self.pending)?;
        let rest = self.pending.split_off(end + SENTINEL.len());
        self.pending.truncate(end);
        self.scan = SentinelScan::new();
        Some(mem::replace(&mut self.pending, rest))
    }

    fn take_pending(&mut self) -> Vec<u8> {
        self.scan = SentinelScan::new();
        mem::take(&mut self.pending)
    }
}

impl<C: Write> Framer<C> {
    /// Serialises `document` compactly and writes it as one frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Serialize`] when `document` cannot be encoded and
    /// any error from [`Self::write_raw`].
    pub fn write_frame<T: Serialize + ?Sized>(&mut self, document: &T) -> Result<usize, FrameError> {
        let payload = serde_json::to_vec(document).map_err(|source| FrameError::Serialize {
            source: Arc::new(source),
        })?;
        self.write_raw(&payload)
    }

    /// Writes `payload` followed by the sentinel in a single write call, then
    /// flushes. An empty payload still produces a sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Write`] when the channel fails and
    /// [`FrameError::ShortWrite`] when it accepts only part of the frame.
    pub fn write_raw(&mut self, payload: &[u8]) -> Result<usize, FrameError> {
        let mut frame = Vec::with_capacity(payload.len() + SENTINEL.len());
        frame.extend_from_slice(payload);
        frame.extend_from_slice(SENTINEL);

        let written = self
            .channel
            .write(&frame)
            .map_err(|source| FrameError::Write {
                source: Arc::new(source),
            })?;
        self.channel.flush().map_err(|source| FrameError::Write {
            source: Arc::new(source),
        })?;

        if written != frame.len() {
            return Err(FrameError::ShortWrite {
                written,
                expected: frame.len(),
            });
        }
        trace!(target: FRAMING_TARGET, written, "wrote frame");
        Ok(written)
    }
}

/// Sanitises raw frame bytes and parses them as JSON.
///
/// # Errors
///
/// Returns [`FrameError::Decode`] when the sanitised text is not JSON.
pub fn decode_frame(frame: &[u8]) -> Result<Value, FrameError> {
    let text = sanitize(frame);
    serde_json::from_str(&text).map_err(|source| FrameError::Decode {
        source: Arc::new(source),
    })
}

/// Decodes `bytes` lossily as UTF-8 and strips code points that are neither
/// printable nor whitespace.
///
/// Control characters other than newline, tab, and carriage return are
/// removed, as are replacement characters left by invalid UTF-8, zero-width
/// and bidirectional formatting characters, and line or paragraph separators.
#[must_use]
pub fn sanitize(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|character| is_retained(*character))
        .collect()
}

const fn is_retained(character: char) -> bool {
    match character {
        '\n' | '\t' | '\r' => true,
        '\u{0}'..='\u{1F}' | '\u{7F}'..='\u{9F}' => false,
        '\u{AD}'
        | '\u{200B}'..='\u{200F}'
        | '\u{2028}'..='\u{202E}'
        | '\u{2060}'..='\u{2064}'
        | '\u{2066}'..='\u{206F}'
        | '\u{FEFF}'
        | '\u{FFF9}'..='\u{FFFD}' => false,
        _ => true,
    }
}

/// Incremental search for a sentinel that is not inside a JSON string.
///
/// The scan resumes where the previous call stopped, so each byte is examined
/// once per frame. A possible sentinel prefix at the end of the buffer is left
/// unconsumed until more bytes arrive.
#[derive(Debug, Clone, Copy)]
struct SentinelScan {
    offset: usize,
    in_string: bool,
    escaped: bool,
}

impl SentinelScan {
    const fn new() -> Self {
        Self {
            offset: 0,
            in_string: false,
            escaped: false,
        }
    }

    fn advance(&mut self, bytes: &[u8]) -> Option<usize> {
        while let Some(rest) = bytes.get(self.offset..).filter(|rest| !rest.is_empty()) {
            if self.in_string {
                match rest.first() {
                    Some(_) if self.escaped => self.escaped = false,
                    Some(b'\\') => self.escaped = true,
                    Some(b'"') => self.in_string = false,
                    _ => {}
                }
            } else if rest.starts_with(SENTINEL) {
                return Some(self.offset);
            } else if SENTINEL.starts_with(rest) {
                return None;
            } else if rest.first() == Some(&b'"') {
                self.in_string = true;
            }
            self.offset += 1;
        }
        None
    }
}

/// Joins a reader and a writer into one duplex channel.
///
/// Plugins pair stdin with stdout; the chat client pairs a child's stdout with
/// its stdin.
#[derive(Debug)]
pub struct Duplex<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> Duplex<R, W> {
    /// Combines `reader` and `writer`.
    #[must_use]
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Borrows the read half.
    #[must_use]
    pub const fn reader(&self) -> &R {
        &self.reader
    }

    /// Borrows the write half.
    #[must_use]
    pub const fn writer(&self) -> &W {
        &self.writer
    }

    /// Mutably borrows the write half.
    pub const fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Splits the channel back into its halves.
    #[must_use]
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: Read, W> Read for Duplex<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R, W: Write> Write for Duplex<R, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests;
