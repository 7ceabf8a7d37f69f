//! Durable storage for bearer tokens.
//!
//! Tokens are kept in a small JSON document:
//! `{"access_token": "...", "refresh_token": "...", "issued_at": <unix secs>}`.
//! A missing file or missing keys mean "not authorised". Client credentials
//! live in `config.json` and are never written here.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::CredentialError;

const STORE_TARGET: &str = "rise_auth::store";

/// Tokens persisted between plugin runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    /// Bearer token attached to API calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Long-lived token used to mint new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix timestamp, in seconds, of the last token issue.
    #[serde(default)]
    pub issued_at: i64,
}

impl StoredTokens {
    /// Current access token, ignoring blank values.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        non_blank(self.access_token.as_deref())
    }

    /// Current refresh token, ignoring blank values.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        non_blank(self.refresh_token.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|token| !token.trim().is_empty())
}

/// Persistence seam for [`StoredTokens`].
pub trait CredentialStore {
    /// Loads the persisted tokens; absent state loads as the default.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] when the backing storage fails.
    fn load(&self) -> Result<StoredTokens, CredentialError>;

    /// Replaces the persisted tokens.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] when the backing storage fails; the
    /// previous tokens remain in place.
    fn save(&mut self, tokens: &StoredTokens) -> Result<(), CredentialError>;

    /// Removes every persisted token.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] when the backing storage fails.
    fn clear(&mut self) -> Result<(), CredentialError>;
}

/// Token store backed by a JSON file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store for the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Token file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> CredentialError {
        CredentialError::Store {
            path: self.path.clone(),
            source: Arc::new(source),
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<StoredTokens, CredentialError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(StoredTokens::default());
            }
            Err(error) => return Err(self.io_error(error)),
        };
        if contents.trim().is_empty() {
            return Ok(StoredTokens::default());
        }
        match serde_json::from_str(&contents) {
            Ok(tokens) => Ok(tokens),
            Err(error) => {
                warn!(
                    target: STORE_TARGET,
                    path = %self.path.display(),
                    %error,
                    "ignoring unreadable token file"
                );
                Ok(StoredTokens::default())
            }
        }
    }

    fn save(&mut self, tokens: &StoredTokens) -> Result<(), CredentialError> {
        let bytes =
            serde_json::to_vec_pretty(tokens).map_err(|source| CredentialError::StoreFormat {
                path: self.path.clone(),
                source: Arc::new(source),
            })?;
        write_atomically(&self.path, &bytes).map_err(|error| self.io_error(error))
    }

    fn clear(&mut self) -> Result<(), CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(self.io_error(error)),
        }
    }
}

/// Token store kept in memory, for tests and embedders.
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    tokens: StoredTokens,
    saves: usize,
}

#[cfg(any(test, feature = "test-support"))]
impl MemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `tokens`.
    #[must_use]
    pub const fn with_tokens(tokens: StoredTokens) -> Self {
        Self { tokens, saves: 0 }
    }

    /// Tokens currently held.
    #[must_use]
    pub const fn tokens(&self) -> &StoredTokens {
        &self.tokens
    }

    /// Number of successful saves.
    #[must_use]
    pub const fn saves(&self) -> usize {
        self.saves
    }
}

#[cfg(any(test, feature = "test-support"))]
impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<StoredTokens, CredentialError> {
        Ok(self.tokens.clone())
    }

    fn save(&mut self, tokens: &StoredTokens) -> Result<(), CredentialError> {
        self.tokens = tokens.clone();
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CredentialError> {
        self.tokens = StoredTokens::default();
        Ok(())
    }
}

/// Writes `bytes` to a temporary file beside `path` and renames it into
/// place, creating the parent directory when needed.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}
