//! Callback URLs handed over by the user through `auth.json`.
//!
//! After consenting in a browser the user pastes the redirect URL into the
//! plugin's `auth.json` as `{"auth_url": "<callback url>"}`. The URL is
//! consumed once: [`PendingAuthorization::take`] strips the key and keeps any
//! other keys the file holds.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::CredentialError;
use crate::store::write_atomically;

/// Key holding the pasted callback URL.
pub const PENDING_AUTH_KEY: &str = "auth_url";

/// Handle on the pending authorisation file.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    path: PathBuf,
}

impl PendingAuthorization {
    /// Creates a handle for the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Pending authorisation file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the pending callback URL without consuming it.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::PendingAuthorization`] when the file exists
    /// but cannot be read or is not a JSON object.
    pub fn peek(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.read()?.and_then(|map| callback_url(&map)))
    }

    /// Removes and returns the pending callback URL.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::PendingAuthorization`] when the file cannot
    /// be read, parsed, or rewritten.
    pub fn take(&self) -> Result<Option<String>, CredentialError> {
        let Some(mut map) = self.read()? else {
            return Ok(None);
        };
        let url = callback_url(&map);
        if map.remove(PENDING_AUTH_KEY).is_none() {
            return Ok(url);
        }
        let bytes = serde_json::to_vec_pretty(&Value::Object(map))
            .map_err(|error| self.failure(error))?;
        write_atomically(&self.path, &bytes).map_err(|error| self.failure(error))?;
        Ok(url)
    }

    fn read(&self) -> Result<Option<Map<String, Value>>, CredentialError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(self.failure(error)),
        };
        if contents.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str(&contents).map_err(|error| self.failure(error))? {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(self.failure("expected a JSON object")),
        }
    }

    fn failure(&self, message: impl ToString) -> CredentialError {
        CredentialError::PendingAuthorization {
            path: self.path.clone(),
            message: message.to_string(),
        }
    }
}

fn callback_url(map: &Map<String, Value>) -> Option<String> {
    map.get(PENDING_AUTH_KEY)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_owned)
}
