//! Binary entrypoint for the template plugin.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use rise_plugin_template::{Cli, install_telemetry, run};
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(error) = install_telemetry(&cli) {
        writeln!(io::stderr().lock(), "logging disabled: {error}").ok();
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    run(&cli, stdin.lock(), stdout.lock()).map_or_else(
        |err| {
            error!(error = %err, "plugin stopped");
            writeln!(io::stderr().lock(), "{err}").ok();
            ExitCode::FAILURE
        },
        |summary| {
            info!(?summary, "plugin exited");
            ExitCode::SUCCESS
        },
    )
}
