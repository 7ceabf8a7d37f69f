//! Interactive client for Rise plugins.
//!
//! `rise-chat` spawns a plugin executable, sends `initialize`, and then turns
//! every line typed at the `ME: ` prompt into a tool call. Streamed partial
//! frames are printed as they arrive and the final reply follows the
//! `RISE: ` prefix. `/call <func> [json]` sends an arbitrary call and `/quit`
//! or end of input sends `shutdown`. The plugin then gets a bounded grace
//! period to exit before it is killed.

pub mod cli;
pub mod connection;
pub mod error;
pub mod indicator;
pub mod session;

#[cfg(test)]
mod tests;

use std::ffi::OsString;
use std::io::{self, BufRead, Read, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use rise_plugin::telemetry::{self, LogDestination};
use tracing::{info, warn};

pub use self::cli::Cli;
pub use self::connection::{ExitOutcome, PluginChannel, PluginConnection, PluginProcess};
pub use self::error::ClientError;
pub use self::indicator::{ActivityIndicator, IndicatorHandle};
pub use self::session::{ChatSession, Flow, PLUGIN_PROMPT, USER_PROMPT};

const CLIENT_TARGET: &str = "rise_chat";

/// Runs the client with the provided arguments and IO handles.
#[must_use]
pub fn run<I, R, W, E>(args: I, stdin: &mut R, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let rendered = error.render();
            let written = if error.use_stderr() {
                writeln!(stderr, "{rendered}")
            } else {
                writeln!(stdout, "{rendered}")
            };
            written.ok();
            return ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(1));
        }
    };

    if let Err(error) = telemetry::initialise(&cli.log_settings(), &LogDestination::Stderr) {
        writeln!(stderr, "logging disabled: {error}").ok();
    }

    chat_with_plugin(&cli, stdin, stdout).map_or_else(
        |error| {
            writeln!(stderr, "rise-chat: {error}").ok();
            ExitCode::FAILURE
        },
        |()| ExitCode::SUCCESS,
    )
}

fn chat_with_plugin<R, W>(cli: &Cli, stdin: &mut R, stdout: &mut W) -> Result<(), ClientError>
where
    R: BufRead,
    W: Write,
{
    let (mut process, connection) = PluginProcess::spawn(&cli.plugin, &cli.plugin_args)?;
    info!(target: CLIENT_TARGET, pid = process.id(), "plugin started");

    let mut session = ChatSession::new(connection, cli.func.as_str());
    if !cli.quiet {
        session = session.with_indicator(ActivityIndicator::new(io::stderr()));
    }
    let outcome = converse(&mut session, stdin, stdout);
    // Closing the pipes lets a well-behaved plugin see end of input.
    drop(session);

    match process.wait(Duration::from_secs(cli.exit_timeout))? {
        ExitOutcome::Exited(status) => info!(target: CLIENT_TARGET, %status, "plugin exited"),
        ExitOutcome::Killed => warn!(target: CLIENT_TARGET, "plugin was killed"),
    }
    outcome
}

/// Drives one conversation: `initialize`, the prompt loop, then `shutdown`.
///
/// # Errors
///
/// Returns a [`ClientError`] when the terminal or the plugin channel fails.
pub fn converse<C, R, W>(
    session: &mut ChatSession<C>,
    stdin: &mut R,
    stdout: &mut W,
) -> Result<(), ClientError>
where
    C: Read + Write,
    R: BufRead,
    W: Write,
{
    session.initialize(stdout)?;
    session.run(stdin, stdout)?;
    session.shutdown(stdout)?;
    Ok(())
}
