//! Domain errors raised by the plugin runtime.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. I/O and JSON errors are wrapped in
//! `Arc` to satisfy the `result_large_err` Clippy lint and keep the enums
//! cloneable.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while moving frames across the byte channel.
#[derive(Debug, Clone, Error)]
pub enum FrameError {
    /// The underlying reader returned an I/O error.
    #[error("failed to read from channel: {source}")]
    Read {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The channel reached end of stream before any byte of a frame arrived.
    #[error("channel closed before a frame arrived")]
    StreamClosed,
    /// The frame was not valid JSON after sanitisation.
    #[error("frame is not valid JSON: {source}")]
    Decode {
        /// Underlying parse error.
        #[source]
        source: Arc<serde_json::Error>,
    },
    /// The outbound document could not be serialised.
    #[error("failed to serialise outbound document: {source}")]
    Serialize {
        /// Underlying serialisation error.
        #[source]
        source: Arc<serde_json::Error>,
    },
    /// The underlying writer returned an I/O error.
    #[error("failed to write to channel: {source}")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The writer accepted fewer bytes than the frame holds.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes accepted by the writer.
        written: usize,
        /// Bytes in the encoded frame.
        expected: usize,
    },
}

impl FrameError {
    /// Reports whether this error came from the read side of the channel.
    #[must_use]
    pub const fn is_read_failure(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::StreamClosed)
    }

    /// Reports whether this error came from decoding a complete frame.
    #[must_use]
    pub const fn is_decode_failure(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Errors a handler may return. Each is reported to the host as a failure
/// response carrying the display text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// A required parameter was missing or had the wrong type.
    #[error("Invalid parameters: {message}")]
    InvalidParams {
        /// Description of the problem.
        message: String,
    },
    /// No usable credential exists; the message tells the user what to do.
    #[error("{message}")]
    Authorization {
        /// Instruction for the user.
        message: String,
    },
    /// The wrapped API answered with a non-success status.
    #[error("Request failed with status {status}: {message}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Response body or reason text.
        message: String,
    },
    /// Any other handler failure.
    #[error("{message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
    /// The handler panicked; the payload text is preserved.
    #[error("Handler panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },
}

impl HandlerError {
    /// Builds an [`HandlerError::InvalidParams`] error.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Builds an [`HandlerError::Failed`] error.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Errors raised while routing a command envelope.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The envelope or a call inside it did not match the command schema.
    #[error("Malformed input")]
    Malformed,
    /// No handler is registered under the requested name.
    #[error("Unknown command: {name}")]
    UnknownCommand {
        /// Requested command name.
        name: String,
    },
    /// The handler returned an error.
    #[error(transparent)]
    Handler(#[from] HandlerError),
    /// The channel kept failing and the loop gave up.
    #[error("channel closed after {failures} consecutive read failures")]
    ChannelClosed {
        /// Consecutive read failures observed.
        failures: u32,
        /// Last read failure.
        #[source]
        source: FrameError,
    },
}

/// Errors raised while registering handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The name is handled by the session lifecycle itself.
    #[error("command '{name}' is reserved for the session lifecycle")]
    Reserved {
        /// Rejected name.
        name: String,
    },
    /// A handler is already registered under the name.
    #[error("command '{name}' is already registered")]
    Duplicate {
        /// Rejected name.
        name: String,
    },
    /// The name was empty or blank.
    #[error("command name must not be empty")]
    EmptyName,
}
