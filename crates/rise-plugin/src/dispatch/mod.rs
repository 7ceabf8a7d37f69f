//! Command dispatch over a framed channel.
//!
//! A [`Session`] owns the handler registry and lifecycle state. The
//! [`Dispatcher`] drives it: read a frame, route every call in the envelope,
//! write the last response, and stop after `shutdown`. Transport failures are
//! logged and the loop keeps going, except that a channel which fails
//! [`CONSECUTIVE_READ_FAILURE_LIMIT`] times in a row is treated as closed.

mod context;
mod registry;
mod session;

use std::io::{Read, Write};

use tracing::{info, warn};

use crate::error::DispatchError;
use crate::framing::Framer;

pub use self::context::{DiscardPartials, HandlerContext, PartialSink};
pub use self::registry::{Handler, HandlerRegistry, HandlerResult};
pub use self::session::{LifecycleState, PluginLifecycle, Session};

pub(crate) const DISPATCH_TARGET: &str = "rise_plugin::dispatch";

/// Read failures tolerated back to back before the channel counts as closed.
pub const CONSECUTIVE_READ_FAILURE_LIMIT: u32 = 10;

/// Counters describing a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Envelopes decoded and routed.
    pub envelopes: usize,
    /// Final responses written in full.
    pub responses: usize,
    /// Read failures observed.
    pub read_failures: usize,
    /// Frames that failed to decode.
    pub decode_failures: usize,
    /// Responses that could not be written.
    pub write_failures: usize,
}

/// Drives a [`Session`] over a [`Framer`] until shutdown.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    read_failure_limit: u32,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Creates a dispatcher using [`CONSECUTIVE_READ_FAILURE_LIMIT`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            read_failure_limit: CONSECUTIVE_READ_FAILURE_LIMIT,
        }
    }

    /// Overrides the consecutive read failure limit. Zero is treated as one.
    #[must_use]
    pub const fn with_read_failure_limit(mut self, limit: u32) -> Self {
        self.read_failure_limit = if limit == 0 { 1 } else { limit };
        self
    }

    /// Processes frames until a `shutdown` response has been written.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::ChannelClosed`] when the channel fails to
    /// deliver a frame too many times in a row.
    pub fn run<S, C>(
        &self,
        session: &mut Session<S>,
        framer: &mut Framer<C>,
    ) -> Result<RunSummary, DispatchError>
    where
        S: PluginLifecycle,
        C: Read + Write,
    {
        let mut summary = RunSummary::default();
        let mut consecutive_failures = 0_u32;
        loop {
            let document = match framer.read_document() {
                Ok(document) => {
                    consecutive_failures = 0;
                    document
                }
                Err(error) if error.is_decode_failure() => {
                    summary.decode_failures += 1;
                    warn!(target: DISPATCH_TARGET, %error, "discarding undecodable frame");
                    continue;
                }
                Err(error) => {
                    summary.read_failures += 1;
                    consecutive_failures += 1;
                    warn!(
                        target: DISPATCH_TARGET,
                        %error,
                        consecutive_failures,
                        "failed to read frame"
                    );
                    if consecutive_failures >= self.read_failure_limit {
                        return Err(DispatchError::ChannelClosed {
                            failures: consecutive_failures,
                            source: error,
                        });
                    }
                    continue;
                }
            };

            summary.envelopes += 1;
            let response = session.process_document(document, framer);
            match framer.write_frame(&response) {
                Ok(_) => summary.responses += 1,
                Err(error) => {
                    summary.write_failures += 1;
                    warn!(target: DISPATCH_TARGET, %error, "failed to write response");
                }
            }

            if session.lifecycle().is_terminating() {
                session.finish();
                info!(target: DISPATCH_TARGET, ?summary, "dispatch loop stopped");
                return Ok(summary);
            }
        }
    }
}
