//! Plugin state and lifecycle hooks.

use rise_auth::{Authorization, CredentialManager, OAuthSettings};
use rise_config::{PluginConfig, PluginPaths};
use rise_plugin::{HandlerError, HandlerResult, PluginLifecycle, ResponseEnvelope};
use serde_json::Value;
use tracing::{info, warn};

use crate::backend::CredentialBackend;

pub(crate) const PLUGIN_TARGET: &str = "rise_plugin_template::plugin";

type Manager<B> =
    CredentialManager<<B as CredentialBackend>::Transport, <B as CredentialBackend>::Store>;

/// State shared by the template plugin's handlers.
pub struct TemplatePlugin<B: CredentialBackend> {
    paths: PluginPaths,
    backend: B,
    config: PluginConfig,
    settings: Option<OAuthSettings>,
    credentials: Option<Manager<B>>,
}

impl<B: CredentialBackend> TemplatePlugin<B> {
    /// Creates an uninitialised plugin rooted at `paths`.
    #[must_use]
    pub fn new(paths: PluginPaths, backend: B) -> Self {
        Self {
            paths,
            backend,
            config: PluginConfig::default(),
            settings: None,
            credentials: None,
        }
    }

    /// Plugin directory layout.
    #[must_use]
    pub const fn paths(&self) -> &PluginPaths {
        &self.paths
    }

    /// Configuration loaded by the last `initialize`.
    #[must_use]
    pub const fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Credential manager, present once OAuth settings are configured.
    #[must_use]
    pub const fn credentials(&self) -> Option<&Manager<B>> {
        self.credentials.as_ref()
    }

    /// Credential manager for handlers that need a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Authorization`] when OAuth has not been
    /// configured.
    pub fn credentials_mut(&mut self) -> Result<&mut Manager<B>, HandlerError> {
        self.credentials
            .as_mut()
            .ok_or_else(|| HandlerError::Authorization {
                message: format!(
                    "OAuth is not configured. Add client_id and client_secret to {} and \
                     initialize the plugin again.",
                    self.paths.config_path().display()
                ),
            })
    }

    fn reload_credentials(&mut self) -> Result<(), HandlerError> {
        let Some(settings) = OAuthSettings::from_config(&self.config)? else {
            self.settings = None;
            self.credentials = None;
            return Ok(());
        };
        if self.credentials.is_some() && self.settings.as_ref() == Some(&settings) {
            return Ok(());
        }
        self.credentials = Some(self.backend.connect(settings.clone(), &self.paths)?);
        self.settings = Some(settings);
        Ok(())
    }
}

impl<B: CredentialBackend> PluginLifecycle for TemplatePlugin<B> {
    fn initialize(&mut self) -> HandlerResult {
        self.paths
            .ensure_dir()
            .map_err(|error| HandlerError::failed(error.to_string()))?;
        self.config = PluginConfig::load(self.paths.config_path())
            .map_err(|error| HandlerError::failed(error.to_string()))?;
        self.reload_credentials()?;

        let Some(manager) = self.credentials.as_mut() else {
            info!(target: PLUGIN_TARGET, "initialized without OAuth settings");
            return Ok(ResponseEnvelope::success("Plugin initialized"));
        };
        match manager.ensure_authorized()? {
            Authorization::Authorized => {
                info!(target: PLUGIN_TARGET, "initialized with valid credentials");
                Ok(ResponseEnvelope::success("Plugin initialized and authorized"))
            }
            Authorization::NeedsUserAction {
                message,
                authorization_url,
            } => {
                warn!(target: PLUGIN_TARGET, "authorization required");
                Ok(ResponseEnvelope::success(message)
                    .with_extra("authorization_url", Value::String(authorization_url)))
            }
        }
    }

    fn shutdown(&mut self) -> HandlerResult {
        self.credentials = None;
        info!(target: PLUGIN_TARGET, "plugin shutting down");
        Ok(ResponseEnvelope::success("Plugin shutdown"))
    }
}
