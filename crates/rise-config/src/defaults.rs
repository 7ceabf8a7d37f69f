//! Default values for the shared plugin settings.

use std::env;
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Environment variable overriding the base directory holding plugin folders.
pub const PLUGIN_DIR_ENV: &str = "RISE_PLUGIN_DIR";

/// Name of the per-plugin configuration file.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Name of the file the user writes the authorisation callback into.
pub const PENDING_AUTH_FILE_NAME: &str = "auth.json";

/// Name of the file holding persisted bearer tokens.
pub const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log format used by plugins unless a flag or `RISE_LOG_FORMAT` says
/// otherwise. Plugin logs land in a file, so structured output is the default.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Computes the directory under which each plugin gets its own folder.
///
/// The platform data directory is preferred; hosts without one fall back to
/// the temporary directory so plugins can still start.
#[must_use]
pub fn default_plugin_base_dir() -> PathBuf {
    let mut base = dirs::data_dir().unwrap_or_else(env::temp_dir);
    base.push("rise");
    base.push("plugins");
    base
}
