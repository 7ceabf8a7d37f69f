//! Construction of the credential manager once settings are known.

use std::time::Duration;

use rise_auth::{
    CredentialError, CredentialManager, CredentialStore, DEFAULT_REQUEST_TIMEOUT,
    FileCredentialStore, HttpTransport, OAuthSettings, PendingAuthorization, ReqwestTransport,
};
use rise_config::PluginPaths;

/// Builds a [`CredentialManager`] for the plugin's directory.
pub trait CredentialBackend {
    /// HTTP transport handed to the manager.
    type Transport: HttpTransport;
    /// Token store handed to the manager.
    type Store: CredentialStore;

    /// Creates a manager for `settings`, persisting under `paths`.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] when the transport cannot be created.
    fn connect(
        &self,
        settings: OAuthSettings,
        paths: &PluginPaths,
    ) -> Result<CredentialManager<Self::Transport, Self::Store>, CredentialError>;
}

/// Production backend: `reqwest` transport and file-backed tokens.
#[derive(Debug, Clone, Copy)]
pub struct HttpBackend {
    timeout: Duration,
}

impl HttpBackend {
    /// Creates a backend with a custom request timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl CredentialBackend for HttpBackend {
    type Transport = ReqwestTransport;
    type Store = FileCredentialStore;

    fn connect(
        &self,
        settings: OAuthSettings,
        paths: &PluginPaths,
    ) -> Result<CredentialManager<Self::Transport, Self::Store>, CredentialError> {
        let transport = ReqwestTransport::with_timeout(self.timeout)?;
        let store = FileCredentialStore::new(paths.credentials_path());
        Ok(CredentialManager::new(settings, transport, store)
            .with_pending_authorization(PendingAuthorization::new(paths.pending_auth_path())))
    }
}
