//! Command-line flags shared by every plugin binary.

use std::path::PathBuf;

use clap::Args;

use crate::defaults::{DEFAULT_LOG_FILTER, default_log_format, default_plugin_base_dir};
use crate::logging::LogFormat;
use crate::paths::{PathsError, PluginPaths};

/// Flags understood by every plugin binary.
///
/// Each flag falls back to an environment variable so hosts that cannot pass
/// arguments can still relocate the plugin directory or tune logging.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct PluginArgs {
    /// Base directory holding one folder per plugin.
    #[arg(long, value_name = "DIR", env = "RISE_PLUGIN_DIR")]
    pub plugin_dir: Option<PathBuf>,
    /// Tracing filter expression (for example `info,rise_auth=debug`).
    #[arg(long, value_name = "FILTER", env = "RISE_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
    /// Log output format.
    #[arg(
        long,
        value_name = "FORMAT",
        env = "RISE_LOG_FORMAT",
        default_value_t = default_log_format()
    )]
    pub log_format: LogFormat,
    /// Writes logs to stderr instead of the plugin log file.
    #[arg(long)]
    pub log_stderr: bool,
}

impl Default for PluginArgs {
    fn default() -> Self {
        Self {
            plugin_dir: None,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
            log_stderr: false,
        }
    }
}

impl PluginArgs {
    /// Base directory, falling back to the platform default.
    #[must_use]
    pub fn base_dir(&self) -> PathBuf {
        self.plugin_dir
            .clone()
            .unwrap_or_else(default_plugin_base_dir)
    }

    /// Derives the directory layout for `plugin_name`.
    ///
    /// # Errors
    ///
    /// Returns a [`PathsError`] when the name is empty or would escape the
    /// base directory.
    pub fn paths(&self, plugin_name: &str) -> Result<PluginPaths, PathsError> {
        PluginPaths::new(self.base_dir(), plugin_name)
    }

    /// Logging settings selected by the flags.
    #[must_use]
    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            filter: self.log_filter.clone(),
            format: self.log_format,
        }
    }
}

/// Logging configuration handed to the telemetry initialiser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Tracing filter expression.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_owned(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::Parser;

    use super::*;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        args: PluginArgs,
    }

    #[test]
    fn explicit_flags_override_defaults() {
        let harness = Harness::try_parse_from([
            "plugin",
            "--plugin-dir",
            "/tmp/rise",
            "--log-filter",
            "debug",
            "--log-format",
            "compact",
            "--log-stderr",
        ])
        .expect("flags should parse");

        assert_eq!(harness.args.base_dir(), PathBuf::from("/tmp/rise"));
        assert!(harness.args.log_stderr);
        assert_eq!(
            harness.args.log_settings(),
            LogSettings {
                filter: String::from("debug"),
                format: LogFormat::Compact,
            }
        );
        let paths = harness.args.paths("echo").expect("paths should derive");
        assert_eq!(paths.plugin_dir(), Path::new("/tmp/rise/echo"));
    }

    #[test]
    fn rejects_unknown_log_format() {
        let result = Harness::try_parse_from(["plugin", "--log-format", "pretty"]);
        assert!(result.is_err());
    }

    #[test]
    fn omitted_flags_match_the_default_settings() {
        let harness = Harness::try_parse_from(["plugin"]).expect("no flags needed");
        assert_eq!(harness.args.log_settings(), LogSettings::default());
        assert_eq!(harness.args.log_format, default_log_format());
        assert_eq!(harness.args, PluginArgs::default());
    }

    #[test]
    fn base_dir_defaults_to_platform_location() {
        let args = PluginArgs::default();
        assert!(args.base_dir().ends_with("rise/plugins"));
    }
}
