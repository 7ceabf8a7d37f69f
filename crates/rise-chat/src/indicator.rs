//! Activity cue shown while a round trip is in flight.
//!
//! A background thread prints up to [`MAX_DOTS`] dots, one per interval,
//! then erases them and starts over. The thread only talks to the caller
//! through its stop channel, and [`IndicatorHandle::stop`] joins it, so no
//! cue output can follow the reply.

use std::io::Write;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

const INDICATOR_TARGET: &str = "rise_chat::indicator";

/// Delay between cue updates.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(400);

/// Dots printed before the cue is erased.
pub const MAX_DOTS: usize = 3;

type SharedSink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Factory for activity cues written to one sink.
#[derive(Clone)]
pub struct ActivityIndicator {
    sink: SharedSink,
    interval: Duration,
}

impl std::fmt::Debug for ActivityIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityIndicator")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl ActivityIndicator {
    /// Creates an indicator writing to `sink` at [`DEFAULT_INTERVAL`].
    #[must_use]
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(sink))),
            interval: DEFAULT_INTERVAL,
        }
    }

    /// Overrides the update interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Starts the cue on a background thread.
    #[must_use = "dropping the handle stops the cue immediately"]
    pub fn start(&self) -> IndicatorHandle {
        let (stop, stopped) = mpsc::channel::<()>();
        let sink = Arc::clone(&self.sink);
        let interval = self.interval;
        let spawned = thread::Builder::new()
            .name(String::from("activity-indicator"))
            .spawn(move || {
                let mut dots = 0;
                while let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(interval) {
                    if dots == MAX_DOTS {
                        erase(&sink, dots);
                        dots = 0;
                    } else {
                        emit(&sink, ".");
                        dots += 1;
                    }
                }
                erase(&sink, dots);
            });
        let thread = spawned
            .inspect_err(|error| {
                debug!(target: INDICATOR_TARGET, %error, "activity indicator unavailable");
            })
            .ok();
        IndicatorHandle {
            stop: Some(stop),
            thread,
        }
    }
}

fn emit(sink: &SharedSink, text: &str) {
    let mut guard = sink.lock().unwrap_or_else(PoisonError::into_inner);
    if guard.write_all(text.as_bytes()).and_then(|()| guard.flush()).is_err() {
        debug!(target: INDICATOR_TARGET, "activity cue write failed");
    }
}

fn erase(sink: &SharedSink, dots: usize) {
    if dots == 0 {
        return;
    }
    let backspaces = "\u{8}".repeat(dots);
    emit(sink, &format!("{backspaces}{}{backspaces}", " ".repeat(dots)));
}

/// Running cue. Stopping or dropping it joins the background thread.
#[derive(Debug)]
pub struct IndicatorHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl IndicatorHandle {
    /// Stops the cue, erases it and waits for the thread to finish.
    pub fn stop(mut self) {
        self.halt();
    }

    /// Whether the background thread is still attached.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    fn halt(&mut self) {
        if let Some(stop) = self.stop.take() {
            drop(stop.send(()));
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            debug!(target: INDICATOR_TARGET, "activity indicator thread panicked");
        }
    }
}

impl Drop for IndicatorHandle {
    fn drop(&mut self) {
        self.halt();
    }
}
