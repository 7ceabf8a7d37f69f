//! Reference Rise plugin.
//!
//! Wires the dispatcher to a credential manager and registers a handful of
//! commands that exercise every part of the runtime: plain replies
//! (`echo`), streamed partial frames (`stream_echo`), the consent flow
//! (`authorize`, `reauthorize`) and authenticated API calls
//! (`api_request`). New plugins start by copying this crate and replacing
//! the handlers.

mod backend;
mod handlers;
mod plugin;

#[cfg(test)]
mod tests;

use std::io::{Read, Write};
use std::time::Duration;

use clap::Parser;
use rise_config::{PathsError, PluginArgs};
use rise_plugin::telemetry::{self, LogDestination, TelemetryError, TelemetryHandle};
use rise_plugin::{
    DispatchError, Dispatcher, Duplex, Framer, RegistryError, RunSummary, Session,
};
use thiserror::Error;

pub use self::backend::{CredentialBackend, HttpBackend};
pub use self::handlers::{API_REQUEST, AUTHORIZE, ECHO, REAUTHORIZE, STREAM_ECHO, registry};
pub use self::plugin::TemplatePlugin;

/// Directory name of this plugin under the plugin base directory.
pub const PLUGIN_NAME: &str = "rise-plugin-template";

/// Command-line interface of the template plugin.
#[derive(Debug, Clone, Parser)]
#[command(name = PLUGIN_NAME, version, about = "Reference Rise plugin")]
pub struct Cli {
    /// Shared plugin flags.
    #[command(flatten)]
    pub plugin: PluginArgs,
    /// Timeout, in seconds, for outbound HTTP requests.
    #[arg(long, value_name = "SECS", env = "RISE_HTTP_TIMEOUT", default_value_t = 30)]
    pub http_timeout: u64,
}

impl Cli {
    /// Credential backend honouring [`Self::http_timeout`].
    #[must_use]
    pub const fn backend(&self) -> HttpBackend {
        HttpBackend::new(Duration::from_secs(self.http_timeout))
    }
}

/// Errors that stop the plugin process.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The plugin directory could not be resolved.
    #[error(transparent)]
    Paths(#[from] PathsError),
    /// Logging could not be configured.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// The handler table is inconsistent.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The host channel failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Installs logging to the plugin log file, or to standard error when
/// `--log-stderr` is set.
///
/// # Errors
///
/// Returns a [`TemplateError`] when the plugin directory or the log file
/// cannot be used.
pub fn install_telemetry(cli: &Cli) -> Result<TelemetryHandle, TemplateError> {
    let destination = if cli.plugin.log_stderr {
        LogDestination::Stderr
    } else {
        let paths = cli.plugin.paths(PLUGIN_NAME)?;
        LogDestination::File(paths.log_path().to_path_buf())
    };
    Ok(telemetry::initialise(&cli.plugin.log_settings(), &destination)?)
}

/// Serves the host over `reader` and `writer` until `shutdown`.
///
/// # Errors
///
/// Returns a [`TemplateError`] when the plugin directory is invalid or the
/// channel keeps failing.
pub fn run<R: Read, W: Write>(
    cli: &Cli,
    reader: R,
    writer: W,
) -> Result<RunSummary, TemplateError> {
    serve(cli, cli.backend(), reader, writer)
}

/// [`run`] with a custom credential backend.
///
/// # Errors
///
/// Returns the same errors as [`run`].
pub fn serve<B, R, W>(
    cli: &Cli,
    backend: B,
    reader: R,
    writer: W,
) -> Result<RunSummary, TemplateError>
where
    B: CredentialBackend + 'static,
    R: Read,
    W: Write,
{
    let paths = cli.plugin.paths(PLUGIN_NAME)?;
    let mut session = Session::new(TemplatePlugin::new(paths, backend), registry()?);
    let mut framer = Framer::new(Duplex::new(reader, writer));
    Ok(Dispatcher::new().run(&mut session, &mut framer)?)
}
