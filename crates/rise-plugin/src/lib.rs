//! Plugin-side runtime for the Rise plugin protocol.
//!
//! A host spawns each plugin as a child process and talks to it over a duplex
//! byte channel, normally the plugin's standard input and output. Every
//! message is a UTF-8 JSON document; replies are terminated by the `<<END>>`
//! sentinel.
//!
//! # Architecture
//!
//! - [`framing`] turns the byte channel into complete frames and back.
//! - [`protocol`] defines the command and response envelopes.
//! - [`dispatch`] routes tool calls to registered handlers, enforces the
//!   `initialize`/`shutdown` lifecycle, and converts every handler failure
//!   into a failure response so the loop never dies on a bad command.
//! - [`telemetry`] installs structured logging that stays off standard output.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::io;
//!
//! use rise_plugin::{
//!     Dispatcher, Duplex, Framer, HandlerRegistry, ResponseEnvelope, Session,
//! };
//!
//! let registry = HandlerRegistry::<()>::new()
//!     .with("ping", |_, _| Ok(ResponseEnvelope::success("pong")))
//!     .expect("registration succeeds");
//! let mut session = Session::new((), registry);
//! let mut framer = Framer::new(Duplex::new(io::stdin().lock(), io::stdout().lock()));
//! Dispatcher::new().run(&mut session, &mut framer).expect("loop ends on shutdown");
//! ```

pub mod dispatch;
pub mod error;
pub mod framing;
pub mod protocol;
pub mod telemetry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

#[cfg(test)]
mod tests;

pub use self::dispatch::{
    CONSECUTIVE_READ_FAILURE_LIMIT, DiscardPartials, Dispatcher, HandlerContext, HandlerRegistry,
    HandlerResult, LifecycleState, PartialSink, PluginLifecycle, RunSummary, Session,
};
pub use self::error::{DispatchError, FrameError, HandlerError, RegistryError};
pub use self::framing::{Duplex, FrameBoundary, Framer, READ_CHUNK_SIZE, SENTINEL};
pub use self::protocol::{
    CommandEnvelope, Message, PartialMessage, ReplyFrame, ResponseEnvelope, ToolCall,
};
