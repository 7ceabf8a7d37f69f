//! Per-call view handed to handlers.

use std::io::Write;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{FrameError, HandlerError};
use crate::framing::Framer;
use crate::protocol::{Message, PartialMessage, ToolCall};

use super::DISPATCH_TARGET;

/// Destination for streamed partial frames.
pub trait PartialSink {
    /// Delivers one partial frame to the host.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] when the frame cannot be written.
    fn send_partial(&mut self, partial: &PartialMessage) -> Result<(), FrameError>;
}

impl<C: Write> PartialSink for Framer<C> {
    fn send_partial(&mut self, partial: &PartialMessage) -> Result<(), FrameError> {
        self.write_frame(partial).map(|_| ())
    }
}

impl PartialSink for Vec<PartialMessage> {
    fn send_partial(&mut self, partial: &PartialMessage) -> Result<(), FrameError> {
        self.push(partial.clone());
        Ok(())
    }
}

/// Sink that drops partial frames, for callers without a channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardPartials;

impl PartialSink for DiscardPartials {
    fn send_partial(&mut self, _partial: &PartialMessage) -> Result<(), FrameError> {
        Ok(())
    }
}

/// Arguments of the call being handled plus the streaming channel.
pub struct HandlerContext<'a> {
    command: &'a str,
    call: &'a ToolCall,
    sink: &'a mut dyn PartialSink,
    partials: usize,
}

impl<'a> HandlerContext<'a> {
    /// Builds a context for `call` to `command`.
    #[must_use]
    pub fn new(command: &'a str, call: &'a ToolCall, sink: &'a mut dyn PartialSink) -> Self {
        Self {
            command,
            call,
            sink,
            partials: 0,
        }
    }

    /// Name of the command being handled.
    #[must_use]
    pub const fn command(&self) -> &str {
        self.command
    }

    /// Call parameters.
    #[must_use]
    pub const fn params(&self) -> &Map<String, Value> {
        self.call.params()
    }

    /// Returns the non-blank string parameter `name`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::InvalidParams`] when the parameter is missing,
    /// blank, or not a string.
    pub fn required_str(&self, name: &str) -> Result<&str, HandlerError> {
        match self.params().get(name) {
            Some(Value::String(value)) if !value.trim().is_empty() => Ok(value),
            Some(Value::String(_)) | None => Err(HandlerError::invalid_params(format!(
                "'{name}' is required"
            ))),
            Some(_) => Err(HandlerError::invalid_params(format!(
                "'{name}' must be a string"
            ))),
        }
    }

    /// Returns the string parameter `name` when present and non-blank.
    #[must_use]
    pub fn optional_str(&self, name: &str) -> Option<&str> {
        self.params()
            .get(name)
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Conversation history, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.call.messages()
    }

    /// Content of the most recent `user` message.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages()
            .iter()
            .rev()
            .find(|message| message.role == "user")
            .map(|message| message.content.as_str())
    }

    /// Host system information, when supplied.
    #[must_use]
    pub const fn system_info(&self) -> Option<&Value> {
        self.call.system_info()
    }

    /// Streams one partial frame ahead of the final response.
    ///
    /// Delivery failures are logged and reported as `false`; they never
    /// abort the handler.
    pub fn stream(&mut self, message: impl Into<String>) -> bool {
        let partial = PartialMessage::new(message);
        match self.sink.send_partial(&partial) {
            Ok(()) => {
                self.partials += 1;
                true
            }
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    command = self.command,
                    %error,
                    "failed to stream partial frame"
                );
                false
            }
        }
    }

    /// Number of partial frames delivered so far.
    #[must_use]
    pub const fn partials_sent(&self) -> usize {
        self.partials
    }
}
