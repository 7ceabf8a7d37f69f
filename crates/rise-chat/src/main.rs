//! CLI entrypoint for the Rise chat client.
//!
//! The binary delegates to [`rise_chat::run`]. Standard error stays unlocked
//! because the activity indicator writes to it from its own thread.

use std::io::{self, StdinLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdin: StdinLock<'_> = io::stdin().lock();
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr = io::stderr();
    rise_chat::run(std::env::args_os(), &mut stdin, &mut stdout, &mut stderr)
}
