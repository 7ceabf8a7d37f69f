//! Command and response envelopes exchanged with the host.
//!
//! The host sends a [`CommandEnvelope`] holding one or more [`ToolCall`]s.
//! The plugin answers each envelope with a final [`ResponseEnvelope`],
//! optionally preceded by [`PartialMessage`] frames from streaming handlers.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::DispatchError;

/// Lifecycle command loading configuration and credentials.
pub const INITIALIZE: &str = "initialize";

/// Lifecycle command ending the session.
pub const SHUTDOWN: &str = "shutdown";

/// Names handled by the session itself rather than by registered handlers.
pub const RESERVED_COMMANDS: [&str; 2] = [INITIALIZE, SHUTDOWN];

/// Reports whether `name` is a lifecycle command.
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    RESERVED_COMMANDS.contains(&name)
}

/// A batch of tool calls sent by the host in one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommandEnvelope {
    tool_calls: Vec<ToolCall>,
}

impl CommandEnvelope {
    /// Creates an envelope holding `tool_calls`.
    #[must_use]
    pub const fn new(tool_calls: Vec<ToolCall>) -> Self {
        Self { tool_calls }
    }

    /// Interprets a decoded frame as a command envelope.
    ///
    /// Calls without a string `func` are kept as calls without a `func`, so
    /// the dispatcher can report them one by one. A call whose optional
    /// fields have the wrong shape keeps its `func` and records the problem
    /// in [`ToolCall::invalid_field`].
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Malformed`] when `document` is not an object,
    /// lacks a `tool_calls` array, or that array is empty.
    pub fn from_value(document: Value) -> Result<Self, DispatchError> {
        let Value::Object(mut object) = document else {
            return Err(DispatchError::Malformed);
        };
        let Some(Value::Array(raw_calls)) = object.remove("tool_calls") else {
            return Err(DispatchError::Malformed);
        };
        if raw_calls.is_empty() {
            return Err(DispatchError::Malformed);
        }
        let tool_calls = raw_calls
            .into_iter()
            .map(ToolCall::from_raw)
            .collect();
        Ok(Self { tool_calls })
    }

    /// Calls in host order.
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    /// Consumes the envelope, yielding its calls.
    #[must_use]
    pub fn into_tool_calls(self) -> Vec<ToolCall> {
        self.tool_calls
    }
}

/// One command invocation inside an envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    func: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Map::is_empty"
    )]
    params: Map<String, Value>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system_info: Option<Value>,
    #[serde(skip)]
    invalid_field: Option<String>,
}

impl ToolCall {
    /// Creates a call to `func` without parameters.
    #[must_use]
    pub fn new(func: impl Into<String>) -> Self {
        Self {
            func: Some(func.into()),
            ..Self::default()
        }
    }

    /// Reads one raw call without letting a mistyped optional field hide
    /// the `func`.
    ///
    /// History entries that are not messages are dropped. A non-object
    /// `params` or a non-array `messages` is recorded as the call's invalid
    /// field.
    fn from_raw(raw: Value) -> Self {
        let Value::Object(mut fields) = raw else {
            return Self::default();
        };
        let Some(Value::String(func)) = fields.remove("func") else {
            return Self::default();
        };
        let mut call = Self::new(func);

        match fields.remove("params") {
            None | Some(Value::Null) => {}
            Some(Value::Object(params)) => call.params = params,
            Some(_) => call.invalid_field = Some(String::from("'params' must be an object")),
        }
        match fields.remove("messages") {
            None | Some(Value::Null) => {}
            Some(Value::Array(entries)) => {
                call.messages = entries
                    .into_iter()
                    .filter_map(|entry| serde_json::from_value(entry).ok())
                    .collect();
            }
            Some(_) if call.invalid_field.is_none() => {
                call.invalid_field = Some(String::from("'messages' must be an array"));
            }
            Some(_) => {}
        }
        call.system_info = fields.remove("system_info").filter(|info| !info.is_null());
        call
    }

    /// Replaces the call parameters.
    #[must_use]
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Replaces the conversation history.
    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Attaches host system information.
    #[must_use]
    pub fn with_system_info(mut self, system_info: Value) -> Self {
        self.system_info = Some(system_info);
        self
    }

    /// Requested command name, absent for malformed calls.
    #[must_use]
    pub fn func(&self) -> Option<&str> {
        self.func.as_deref()
    }

    /// Call parameters.
    #[must_use]
    pub const fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Conversation history, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Host system information, when supplied.
    #[must_use]
    pub const fn system_info(&self) -> Option<&Value> {
        self.system_info.as_ref()
    }

    /// Why an optional field of the received call was unusable, if it was.
    #[must_use]
    pub fn invalid_field(&self) -> Option<&str> {
        self.invalid_field.as_deref()
    }
}

/// A chat history entry in the usual role/content shape.
///
/// Missing fields read as empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Speaker role, for example `user` or `assistant`.
    #[serde(default)]
    pub role: String,
    /// Message text.
    #[serde(default)]
    pub content: String,
}

impl Message {
    /// Creates a message.
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Creates a `user` message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Creates an `assistant` message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Final reply to an envelope.
///
/// Handler-defined keys are flattened into the top-level object next to
/// `success` and `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl ResponseEnvelope {
    /// Successful reply carrying user-visible text.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            extra: Map::new(),
        }
    }

    /// Successful reply without user-visible text.
    #[must_use]
    pub fn silent_success() -> Self {
        Self {
            success: true,
            message: None,
            extra: Map::new(),
        }
    }

    /// Failed reply carrying diagnostic text.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            extra: Map::new(),
        }
    }

    /// Adds a handler-defined key. `success` and `message` cannot be
    /// overridden this way and are ignored.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        let name = key.into();
        if name != "success" && name != "message" {
            self.extra.insert(name, value);
        }
        self
    }

    /// Whether the command succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// User-visible text, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Handler-defined keys.
    #[must_use]
    pub const fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

impl From<&DispatchError> for ResponseEnvelope {
    fn from(error: &DispatchError) -> Self {
        Self::failure(error.to_string())
    }
}

/// Intermediate frame written by streaming handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialMessage {
    /// Partial text, for example one generated token.
    pub message: String,
}

impl PartialMessage {
    /// Creates a partial frame.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Any frame a plugin may write in reply to an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyFrame {
    /// Final reply; always carries `success`.
    Final(ResponseEnvelope),
    /// Streaming partial; never carries `success`.
    Partial(PartialMessage),
}

impl ReplyFrame {
    /// Reports whether this frame ends the reply.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
