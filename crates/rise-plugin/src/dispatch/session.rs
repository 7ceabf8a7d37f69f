//! Session state and per-envelope routing.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{DispatchError, HandlerError};
use crate::protocol::{CommandEnvelope, INITIALIZE, ResponseEnvelope, SHUTDOWN, ToolCall};

use super::DISPATCH_TARGET;
use super::context::{HandlerContext, PartialSink};
use super::registry::{HandlerRegistry, HandlerResult};

/// Lifecycle hooks run for the reserved `initialize` and `shutdown` commands.
///
/// Both hooks take no arguments. `initialize` may be called any number of
/// times and must tolerate repeats.
pub trait PluginLifecycle {
    /// Loads configuration and credentials.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] reported to the host as a failure response.
    fn initialize(&mut self) -> HandlerResult {
        Ok(ResponseEnvelope::success("Plugin initialized"))
    }

    /// Releases resources before the process exits.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`]; the session still shuts down.
    fn shutdown(&mut self) -> HandlerResult {
        Ok(ResponseEnvelope::success("Plugin shutdown"))
    }
}

impl PluginLifecycle for () {}

/// Position of the session in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecycleState {
    /// No successful `initialize` yet.
    #[default]
    Started,
    /// At least one `initialize` succeeded.
    Ready,
    /// `shutdown` was handled; its response is pending delivery.
    ShuttingDown,
    /// The shutdown response was flushed and the loop ended.
    Stopped,
}

impl LifecycleState {
    /// Reports whether `shutdown` has been handled.
    #[must_use]
    pub const fn is_terminating(self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Stopped)
    }
}

/// Process-wide plugin state: handler registry, lifecycle, and the state
/// owned by the handlers.
#[derive(Debug)]
pub struct Session<S> {
    state: S,
    registry: HandlerRegistry<S>,
    lifecycle: LifecycleState,
    shutdown_response: Option<ResponseEnvelope>,
}

impl<S: PluginLifecycle> Session<S> {
    /// Creates a session in the [`LifecycleState::Started`] state.
    #[must_use]
    pub fn new(state: S, registry: HandlerRegistry<S>) -> Self {
        Self {
            state,
            registry,
            lifecycle: LifecycleState::Started,
            shutdown_response: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    /// Handler-owned state.
    #[must_use]
    pub const fn state(&self) -> &S {
        &self.state
    }

    /// Mutable handler-owned state.
    pub const fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Registered handlers.
    #[must_use]
    pub const fn registry(&self) -> &HandlerRegistry<S> {
        &self.registry
    }

    /// Marks the shutdown response as delivered.
    pub fn finish(&mut self) {
        if self.lifecycle == LifecycleState::ShuttingDown {
            self.lifecycle = LifecycleState::Stopped;
        }
    }

    /// Routes a decoded frame and returns the response to write.
    pub fn process_document(
        &mut self,
        document: Value,
        sink: &mut dyn PartialSink,
    ) -> ResponseEnvelope {
        CommandEnvelope::from_value(document).map_or_else(
            |error| {
                warn!(target: DISPATCH_TARGET, %error, "rejected command envelope");
                ResponseEnvelope::from(&error)
            },
            |envelope| self.process_envelope(&envelope, sink),
        )
    }

    /// Runs every call of `envelope` in order and returns the last response.
    ///
    /// Calls following a `shutdown` are skipped so the shutdown response is
    /// always the one delivered. Once shutting down, every envelope repeats
    /// that response.
    pub fn process_envelope(
        &mut self,
        envelope: &CommandEnvelope,
        sink: &mut dyn PartialSink,
    ) -> ResponseEnvelope {
        let mut last = None;
        for (index, call) in envelope.tool_calls().iter().enumerate() {
            if self.lifecycle.is_terminating() {
                debug!(
                    target: DISPATCH_TARGET,
                    index,
                    func = call.func().unwrap_or_default(),
                    "skipping call after shutdown"
                );
                continue;
            }
            last = Some(self.dispatch_call(call, sink));
        }
        last.or_else(|| self.shutdown_response.clone())
            .unwrap_or_else(|| ResponseEnvelope::from(&DispatchError::Malformed))
    }

    /// Routes a single call.
    pub fn dispatch_call(&mut self, call: &ToolCall, sink: &mut dyn PartialSink) -> ResponseEnvelope {
        let Some(func) = call.func() else {
            warn!(target: DISPATCH_TARGET, "tool call without func");
            return ResponseEnvelope::from(&DispatchError::Malformed);
        };
        if let Some(problem) = call.invalid_field() {
            warn!(target: DISPATCH_TARGET, command = func, problem, "rejected tool call");
            return ResponseEnvelope::from(&DispatchError::Handler(HandlerError::invalid_params(
                problem,
            )));
        }
        match func {
            INITIALIZE => self.initialize(),
            SHUTDOWN => self.shutdown(),
            name => self.invoke(name, call, sink),
        }
    }

    fn initialize(&mut self) -> ResponseEnvelope {
        if self.lifecycle.is_terminating() {
            warn!(target: DISPATCH_TARGET, "initialize received after shutdown");
        }
        let state = &mut self.state;
        let response = guarded(INITIALIZE, || state.initialize());
        if response.is_success() && self.lifecycle == LifecycleState::Started {
            self.lifecycle = LifecycleState::Ready;
            info!(target: DISPATCH_TARGET, "session ready");
        }
        response
    }

    fn shutdown(&mut self) -> ResponseEnvelope {
        if let Some(response) = &self.shutdown_response {
            debug!(target: DISPATCH_TARGET, "repeating shutdown response");
            return response.clone();
        }
        let state = &mut self.state;
        let response = guarded(SHUTDOWN, || state.shutdown());
        self.lifecycle = LifecycleState::ShuttingDown;
        self.shutdown_response = Some(response.clone());
        info!(target: DISPATCH_TARGET, "session shutting down");
        response
    }

    fn invoke(
        &mut self,
        name: &str,
        call: &ToolCall,
        sink: &mut dyn PartialSink,
    ) -> ResponseEnvelope {
        let Some(handler) = self.registry.get_mut(name) else {
            warn!(target: DISPATCH_TARGET, command = name, "unknown command");
            return ResponseEnvelope::from(&DispatchError::UnknownCommand {
                name: name.to_owned(),
            });
        };
        debug!(target: DISPATCH_TARGET, command = name, "invoking handler");
        let state = &mut self.state;
        let mut context = HandlerContext::new(name, call, sink);
        guarded(name, || handler(state, &mut context))
    }
}

fn guarded(command: &str, run: impl FnOnce() -> HandlerResult) -> ResponseEnvelope {
    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(response)) => response,
        Ok(Err(failure)) => {
            warn!(target: DISPATCH_TARGET, command, error = %failure, "handler failed");
            ResponseEnvelope::from(&DispatchError::Handler(failure))
        }
        Err(payload) => {
            let failure = HandlerError::Panicked {
                message: panic_message(payload.as_ref()),
            };
            error!(target: DISPATCH_TARGET, command, error = %failure, "handler panicked");
            ResponseEnvelope::from(&DispatchError::Handler(failure))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("unknown panic payload"))
}
