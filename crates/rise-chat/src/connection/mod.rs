//! Client side of the framed plugin channel.
//!
//! The client writes one envelope per round trip and then reads frames until
//! a final reply arrives, surfacing streamed partials along the way. Replies
//! are split on the sentinel only; short reads from a pipe carry no meaning.

mod process;

use std::io::{Read, Write};

use rise_plugin::{
    CommandEnvelope, FrameBoundary, Framer, ReplyFrame, ResponseEnvelope, ToolCall,
};
use tracing::debug;

use crate::error::ClientError;

pub use self::process::{ExitOutcome, PluginChannel, PluginProcess};

const CONNECTION_TARGET: &str = "rise_chat::connection";

/// Framed request/reply channel to one plugin.
#[derive(Debug)]
pub struct PluginConnection<C> {
    framer: Framer<C>,
}

impl<C: Read + Write> PluginConnection<C> {
    /// Wraps `channel`, reading frames up to the sentinel.
    #[must_use]
    pub const fn new(channel: C) -> Self {
        Self {
            framer: Framer::with_boundary(channel, FrameBoundary::Sentinel),
        }
    }

    /// Underlying channel.
    #[must_use]
    pub const fn channel(&self) -> &C {
        self.framer.get_ref()
    }

    /// Releases the channel.
    #[must_use]
    pub fn into_inner(self) -> C {
        self.framer.into_inner()
    }

    /// Sends `call` as a single-call envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Channel`] when the frame cannot be written.
    pub fn send(&mut self, call: ToolCall) -> Result<(), ClientError> {
        let envelope = CommandEnvelope::new(vec![call]);
        let written = self.framer.write_frame(&envelope)?;
        debug!(target: CONNECTION_TARGET, written, "sent envelope");
        Ok(())
    }

    /// Reads frames until the final reply, passing each partial message to
    /// `on_partial`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Channel`] when the plugin closes the channel or
    /// sends invalid JSON, and [`ClientError::UnexpectedReply`] for JSON that
    /// is not a reply frame.
    pub fn receive(
        &mut self,
        mut on_partial: impl FnMut(&str),
    ) -> Result<ResponseEnvelope, ClientError> {
        loop {
            let document = self.framer.read_document()?;
            let frame: ReplyFrame = serde_json::from_value(document).map_err(|error| {
                ClientError::UnexpectedReply {
                    message: error.to_string(),
                }
            })?;
            match frame {
                ReplyFrame::Final(response) => return Ok(response),
                ReplyFrame::Partial(partial) => on_partial(&partial.message),
            }
        }
    }

    /// Sends `call` and waits for its final reply.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::send`] and [`Self::receive`].
    pub fn round_trip(
        &mut self,
        call: ToolCall,
        on_partial: impl FnMut(&str),
    ) -> Result<ResponseEnvelope, ClientError> {
        self.send(call)?;
        self.receive(on_partial)
    }
}
