//! Shared configuration for Rise plugins and the chat client.
//!
//! Every plugin owns a directory holding its `config.json`, the pending
//! authorisation file written by the user, the persisted token file, and the
//! plugin log. This crate derives that layout, loads the tolerant JSON
//! configuration, and exposes the logging and command-line settings shared by
//! the binaries.

mod args;
mod config;
mod defaults;
mod logging;
mod paths;

pub use args::{LogSettings, PluginArgs};
pub use config::{ConfigError, PluginConfig};
pub use defaults::{
    CONFIG_FILE_NAME, CREDENTIALS_FILE_NAME, DEFAULT_LOG_FILTER, PENDING_AUTH_FILE_NAME,
    PLUGIN_DIR_ENV, default_log_format, default_plugin_base_dir,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use paths::{PathsError, PluginPaths};
