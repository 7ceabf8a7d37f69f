//! Tolerant loader for a plugin's `config.json`.
//!
//! Plugins read their settings from a flat JSON object. A plugin that has not
//! been configured yet must still start and answer `initialize`, so a missing
//! file loads as an empty configuration. A file that exists but is not a JSON
//! object is reported, since silently ignoring it would hide user mistakes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Key/value settings loaded from `config.json`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginConfig {
    values: Map<String, Value>,
}

impl PluginConfig {
    /// Loads the configuration at `path`.
    ///
    /// A missing file yields an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file exists but cannot be read,
    /// and the errors of [`Self::parse`], tagged with `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: Arc::new(source),
                });
            }
        };
        Self::parse(&contents).map_err(|error| error.with_path(path))
    }

    /// Parses configuration text. Blank text is treated as an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for text that is not JSON and
    /// [`ConfigError::NotAnObject`] for JSON that is not an object.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(contents).map_err(|source| ConfigError::Parse {
            path: None,
            source: Arc::new(source),
        })?;
        match value {
            Value::Object(values) => Ok(Self { values }),
            other => Err(ConfigError::NotAnObject {
                path: None,
                found: json_kind(&other),
            }),
        }
    }

    /// Builds a configuration from an in-memory map.
    #[must_use]
    pub const fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Returns the raw value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the non-empty string stored under `key`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Reports whether the configuration holds no settings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Deserialises the whole configuration into a typed settings struct.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the values do not fit `T`.
    pub fn parse_as<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        serde_json::from_value(Value::Object(self.values.clone())).map_err(|source| {
            ConfigError::Invalid {
                source: Arc::new(source),
            }
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Errors raised while loading plugin configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("failed to read configuration '{path}': {source}")]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The configuration was not valid JSON.
    #[error("configuration{} is not valid JSON: {source}", describe_path(.path.as_deref()))]
    Parse {
        /// File the text came from, when known.
        path: Option<PathBuf>,
        /// Underlying parse error.
        #[source]
        source: Arc<serde_json::Error>,
    },
    /// The configuration was valid JSON but not an object.
    #[error("configuration{} must be a JSON object, found {found}", describe_path(.path.as_deref()))]
    NotAnObject {
        /// File the text came from, when known.
        path: Option<PathBuf>,
        /// JSON kind found at the top level.
        found: &'static str,
    },
    /// The configuration did not match the requested settings shape.
    #[error("configuration is invalid: {source}")]
    Invalid {
        /// Underlying deserialisation error.
        #[source]
        source: Arc<serde_json::Error>,
    },
}

impl ConfigError {
    fn with_path(self, file: &Path) -> Self {
        match self {
            Self::Parse { source, .. } => Self::Parse {
                path: Some(file.to_path_buf()),
                source,
            },
            Self::NotAnObject { found, .. } => Self::NotAnObject {
                path: Some(file.to_path_buf()),
                found,
            },
            other => other,
        }
    }
}

fn describe_path(path: Option<&Path>) -> String {
    path.map(|path| format!(" '{}'", path.display()))
        .unwrap_or_default()
}
