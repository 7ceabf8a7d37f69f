//! Structured telemetry initialisation for plugin processes.
//!
//! Standard output carries the protocol, so logs go to the plugin log file or
//! to standard error and never to standard output.

use std::fs::{self, File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use rise_config::{LogFormat, LogSettings};
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Where log events are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    /// Standard error.
    Stderr,
    /// Append to a file, creating it and its parent directory if needed.
    File(PathBuf),
}

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to open the log file.
    #[error("failed to open log file '{path}': {source}")]
    LogFile {
        /// Log file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Repeated calls are idempotent: the first invocation installs the global
/// subscriber and later invocations return a fresh [`TelemetryHandle`]
/// without touching the global state again.
///
/// # Errors
///
/// Returns a [`TelemetryError`] when the filter is invalid, the log file
/// cannot be opened, or another subscriber is already installed.
pub fn initialise(
    settings: &LogSettings,
    destination: &LogDestination,
) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(settings, destination))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(
    settings: &LogSettings,
    destination: &LogDestination,
) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&settings.filter)
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let (writer, ansi) = match destination {
        LogDestination::Stderr => (BoxMakeWriter::new(io::stderr), io::stderr().is_terminal()),
        LogDestination::File(path) => (BoxMakeWriter::new(Arc::new(open_log_file(path)?)), false),
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match settings.format {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn open_log_file(path: &Path) -> Result<File, TelemetryError> {
    let to_error = |source: io::Error| TelemetryError::LogFile {
        path: path.to_path_buf(),
        source: Arc::new(source),
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(to_error)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_error)
}
