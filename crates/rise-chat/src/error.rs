//! Errors raised by the chat client.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use rise_plugin::FrameError;
use thiserror::Error;

/// Errors that end a chat session.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The plugin executable could not be started.
    #[error("failed to start plugin '{path}': {source}")]
    Spawn {
        /// Plugin executable.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// A standard stream of the child was not captured.
    #[error("plugin {stream} was not captured")]
    MissingPipe {
        /// Stream name.
        stream: &'static str,
    },
    /// Exchanging frames with the plugin failed.
    #[error("plugin channel failed: {0}")]
    Channel(#[from] FrameError),
    /// The plugin answered with something that is not a reply frame.
    #[error("unexpected reply from plugin: {message}")]
    UnexpectedReply {
        /// Parse failure description.
        message: String,
    },
    /// Waiting for the plugin to exit failed.
    #[error("failed to wait for plugin: {source}")]
    Wait {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Reading the terminal or writing to it failed.
    #[error("terminal I/O failed: {source}")]
    Terminal {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl ClientError {
    pub(crate) fn terminal(source: io::Error) -> Self {
        Self::Terminal {
            source: Arc::new(source),
        }
    }
}
