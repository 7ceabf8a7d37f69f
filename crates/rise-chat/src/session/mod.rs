//! The read-eval-print loop.

use std::io::{BufRead, Read, Write};

use rise_plugin::{Message, ResponseEnvelope, ToolCall};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::connection::PluginConnection;
use crate::error::ClientError;
use crate::indicator::{ActivityIndicator, IndicatorHandle};

const SESSION_TARGET: &str = "rise_chat::session";

/// Prompt printed before reading user input.
pub const USER_PROMPT: &str = "ME: ";
/// Prefix printed before plugin replies.
pub const PLUGIN_PROMPT: &str = "RISE: ";

/// What the loop does after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// Leave the loop.
    Quit,
}

/// Conversation with one plugin.
#[derive(Debug)]
pub struct ChatSession<C> {
    connection: PluginConnection<C>,
    func: String,
    history: Vec<Message>,
    system_info: Value,
    indicator: Option<ActivityIndicator>,
}

impl<C: Read + Write> ChatSession<C> {
    /// Creates a session sending prompts to `func`.
    #[must_use]
    pub fn new(connection: PluginConnection<C>, func: impl Into<String>) -> Self {
        Self {
            connection,
            func: func.into(),
            history: Vec::new(),
            system_info: system_info(),
            indicator: None,
        }
    }

    /// Shows `indicator` while waiting for replies.
    #[must_use]
    pub fn with_indicator(mut self, indicator: ActivityIndicator) -> Self {
        self.indicator = Some(indicator);
        self
    }

    /// Conversation so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Plugin connection.
    #[must_use]
    pub const fn connection(&self) -> &PluginConnection<C> {
        &self.connection
    }

    /// Releases the plugin connection.
    #[must_use]
    pub fn into_connection(self) -> PluginConnection<C> {
        self.connection
    }

    /// Sends `initialize` and prints the plugin's reply.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the round trip fails.
    pub fn initialize(&mut self, out: &mut impl Write) -> Result<ResponseEnvelope, ClientError> {
        self.call(ToolCall::new("initialize"), out)
    }

    /// Sends `shutdown` and prints the plugin's reply.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the round trip fails.
    pub fn shutdown(&mut self, out: &mut impl Write) -> Result<ResponseEnvelope, ClientError> {
        self.call(ToolCall::new("shutdown"), out)
    }

    /// Prompts for lines on `input` until `/quit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the terminal or the plugin channel
    /// fails.
    pub fn run(&mut self, input: &mut impl BufRead, out: &mut impl Write) -> Result<(), ClientError> {
        let mut line = String::new();
        loop {
            write!(out, "{USER_PROMPT}").map_err(ClientError::terminal)?;
            out.flush().map_err(ClientError::terminal)?;
            line.clear();
            if input.read_line(&mut line).map_err(ClientError::terminal)? == 0 {
                writeln!(out).map_err(ClientError::terminal)?;
                return Ok(());
            }
            if self.handle_line(&line, out)? == Flow::Quit {
                return Ok(());
            }
        }
    }

    /// Handles one line of user input.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] when the round trip fails.
    pub fn handle_line(&mut self, line: &str, out: &mut impl Write) -> Result<Flow, ClientError> {
        let input = line.trim();
        if input.is_empty() {
            return Ok(Flow::Continue);
        }
        if input == "/quit" {
            return Ok(Flow::Quit);
        }
        if let Some(rest) = input.strip_prefix("/call") {
            match parse_call(rest) {
                Ok(call) => {
                    self.call(call, out)?;
                }
                Err(message) => {
                    writeln!(out, "{PLUGIN_PROMPT}{message}").map_err(ClientError::terminal)?;
                }
            }
            return Ok(Flow::Continue);
        }

        self.history.push(Message::user(input));
        let mut params = Map::new();
        params.insert(String::from("prompt"), Value::String(input.to_owned()));
        let call = ToolCall::new(self.func.as_str())
            .with_params(params)
            .with_messages(self.history.clone())
            .with_system_info(self.system_info.clone());
        let response = self.call(call, out)?;
        if response.is_success()
            && let Some(message) = response.message()
        {
            self.history.push(Message::assistant(message));
        }
        Ok(Flow::Continue)
    }

    fn call(&mut self, call: ToolCall, out: &mut impl Write) -> Result<ResponseEnvelope, ClientError> {
        debug!(
            target: SESSION_TARGET,
            func = call.func().unwrap_or_default(),
            "sending call"
        );
        let mut cue: Option<IndicatorHandle> = self.indicator.as_ref().map(ActivityIndicator::start);
        let mut streamed = false;
        let mut terminal_error = None;

        let result = self.connection.round_trip(call, |text| {
            if let Some(handle) = cue.take() {
                handle.stop();
            }
            let prefix = if streamed { " " } else { PLUGIN_PROMPT };
            streamed = true;
            if let Err(error) = write!(out, "{prefix}{text}").and_then(|()| out.flush())
                && terminal_error.is_none()
            {
                terminal_error = Some(error);
            }
        });
        if let Some(handle) = cue.take() {
            handle.stop();
        }
        if let Some(error) = terminal_error {
            return Err(ClientError::terminal(error));
        }

        let response = result?;
        if streamed {
            writeln!(out).map_err(ClientError::terminal)?;
        } else if let Some(message) = response.message() {
            writeln!(out, "{PLUGIN_PROMPT}{message}").map_err(ClientError::terminal)?;
        }
        Ok(response)
    }
}

/// Parses `/call <func> [json params]`.
fn parse_call(rest: &str) -> Result<ToolCall, String> {
    let command = rest.trim();
    let (func, params) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, raw)| (name, raw.trim()));
    if func.is_empty() {
        return Err(String::from("usage: /call <func> [json params]"));
    }
    if params.is_empty() {
        return Ok(ToolCall::new(func));
    }
    match serde_json::from_str(params) {
        Ok(Value::Object(map)) => Ok(ToolCall::new(func).with_params(map)),
        Ok(_) => Err(String::from("parameters must be a JSON object")),
        Err(error) => Err(format!("invalid parameters: {error}")),
    }
}

fn system_info() -> Value {
    json!({
        "client": "rise-chat",
        "version": env!("CARGO_PKG_VERSION"),
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
    })
}
