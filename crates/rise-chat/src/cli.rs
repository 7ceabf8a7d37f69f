//! Command-line arguments for the chat client.

use std::path::PathBuf;

use clap::Parser;
use rise_config::{LogFormat, LogSettings};

/// Command sent for plain prompts when `--func` is not given.
pub const DEFAULT_FUNC: &str = "chat";

/// Seconds to wait for the plugin to exit after `shutdown`.
pub const DEFAULT_EXIT_TIMEOUT_SECS: u64 = 5;

/// Interactive client that drives one plugin over its standard streams.
#[derive(Debug, Clone, Parser)]
#[command(name = "rise-chat", version, about = "Chat with a Rise plugin")]
pub struct Cli {
    /// Plugin executable to spawn.
    #[arg(long, value_name = "PATH")]
    pub plugin: PathBuf,
    /// Command invoked for each prompt.
    #[arg(long, value_name = "NAME", default_value = DEFAULT_FUNC)]
    pub func: String,
    /// Seconds to wait for the plugin to exit before killing it.
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_EXIT_TIMEOUT_SECS)]
    pub exit_timeout: u64,
    /// Suppress the activity indicator.
    #[arg(long)]
    pub quiet: bool,
    /// Log filter for client diagnostics.
    #[arg(long, value_name = "FILTER", env = "RISE_LOG_FILTER", default_value = "warn")]
    pub log_filter: String,
    /// Log output format.
    #[arg(long, value_name = "FORMAT", env = "RISE_LOG_FORMAT", default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
    /// Arguments passed to the plugin, after `--`.
    #[arg(value_name = "PLUGIN_ARGS", last = true)]
    pub plugin_args: Vec<String>,
}

impl Cli {
    /// Logging settings for the client process.
    #[must_use]
    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            filter: self.log_filter.clone(),
            format: self.log_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_apply() {
        let cli = Cli::try_parse_from(["rise-chat", "--plugin", "./plugin"]).expect("parse");
        assert_eq!(cli.func, DEFAULT_FUNC);
        assert_eq!(cli.exit_timeout, DEFAULT_EXIT_TIMEOUT_SECS);
        assert!(cli.plugin_args.is_empty());
        assert!(!cli.quiet);
    }

    #[test]
    fn trailing_arguments_reach_the_plugin() {
        let cli = Cli::try_parse_from([
            "rise-chat",
            "--plugin",
            "./plugin",
            "--func",
            "stream_echo",
            "--",
            "--plugin-dir",
            "/tmp/plugins",
        ])
        .expect("parse");
        assert_eq!(cli.func, "stream_echo");
        assert_eq!(cli.plugin_args, ["--plugin-dir", "/tmp/plugins"]);
    }

    #[rstest]
    #[case(&["rise-chat"])]
    #[case(&["rise-chat", "--plugin", "./plugin", "--exit-timeout", "soon"])]
    fn invalid_invocations_are_rejected(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args).is_err());
    }
}
