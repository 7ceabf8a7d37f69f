//! Derives the on-disk layout owned by a single plugin.
//!
//! Each plugin keeps its configuration, the authorisation callback written by
//! the user, its persisted tokens, and its log under one directory named after
//! the plugin. The template plugin and the chat client need to agree on this
//! layout so users can find the files a plugin asks them to edit.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::defaults::{CONFIG_FILE_NAME, CREDENTIALS_FILE_NAME, PENDING_AUTH_FILE_NAME};

/// Canonical paths for the files a plugin reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginPaths {
    plugin_dir: PathBuf,
    config_path: PathBuf,
    pending_auth_path: PathBuf,
    credentials_path: PathBuf,
    log_path: PathBuf,
}

impl PluginPaths {
    /// Derives the layout for `plugin_name` beneath `base_dir` without
    /// touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`PathsError::EmptyPluginName`] or
    /// [`PathsError::InvalidPluginName`] when `plugin_name` is not a single
    /// path component.
    pub fn new(base_dir: impl AsRef<Path>, plugin_name: &str) -> Result<Self, PathsError> {
        validate_plugin_name(plugin_name)?;
        let plugin_dir = base_dir.as_ref().join(plugin_name);
        Ok(Self {
            config_path: plugin_dir.join(CONFIG_FILE_NAME),
            pending_auth_path: plugin_dir.join(PENDING_AUTH_FILE_NAME),
            credentials_path: plugin_dir.join(CREDENTIALS_FILE_NAME),
            log_path: plugin_dir.join(format!("{plugin_name}.log")),
            plugin_dir,
        })
    }

    /// Creates the plugin directory when it does not yet exist.
    ///
    /// # Errors
    ///
    /// Returns [`PathsError::PluginDirectory`] when the directory cannot be
    /// created.
    pub fn ensure_dir(&self) -> Result<(), PathsError> {
        fs::create_dir_all(&self.plugin_dir).map_err(|source| PathsError::PluginDirectory {
            path: self.plugin_dir.clone(),
            source,
        })
    }

    /// Directory holding every file owned by the plugin.
    #[must_use]
    pub fn plugin_dir(&self) -> &Path {
        self.plugin_dir.as_path()
    }

    /// Path to `config.json`.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        self.config_path.as_path()
    }

    /// Path to the pending authorisation file (`auth.json`).
    #[must_use]
    pub fn pending_auth_path(&self) -> &Path {
        self.pending_auth_path.as_path()
    }

    /// Path to the persisted token file.
    #[must_use]
    pub fn credentials_path(&self) -> &Path {
        self.credentials_path.as_path()
    }

    /// Path to the plugin log file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        self.log_path.as_path()
    }
}

fn validate_plugin_name(name: &str) -> Result<(), PathsError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PathsError::EmptyPluginName);
    }
    let escapes = trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
        || trimmed != name;
    if escapes {
        return Err(PathsError::InvalidPluginName {
            name: name.to_owned(),
        });
    }
    Ok(())
}

/// Errors raised while deriving plugin paths.
#[derive(Debug, Error)]
pub enum PathsError {
    /// The plugin name was empty.
    #[error("plugin name must not be empty")]
    EmptyPluginName,
    /// The plugin name would escape the base directory.
    #[error("plugin name '{name}' must be a single path component")]
    InvalidPluginName {
        /// Rejected name.
        name: String,
    },
    /// Creating the plugin directory failed.
    #[error("failed to prepare plugin directory '{path}': {source}")]
    PluginDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
