//! OAuth provider settings read from a plugin's `config.json`.

use rise_config::PluginConfig;
use serde::Deserialize;
use url::Url;

use crate::error::CredentialError;

/// Path probed with a fresh access token when none is configured.
pub const DEFAULT_PROBE_PATH: &str = "/me";

/// Endpoints and client credentials for one OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthSettings {
    /// Registered client identifier.
    pub client_id: String,
    /// Registered client secret.
    pub client_secret: String,
    /// Consent page the user opens in a browser.
    pub authorize_url: String,
    /// Endpoint exchanging codes and refresh tokens for access tokens.
    pub token_url: String,
    /// Redirect URI registered with the provider.
    pub redirect_uri: String,
    /// Space-separated scopes requested on consent.
    #[serde(default)]
    pub scope: String,
    /// Base URL that relative API paths are joined onto.
    pub api_base_url: String,
    /// Cheap authenticated path used to verify new tokens.
    #[serde(default = "default_probe_path")]
    pub probe_path: String,
}

fn default_probe_path() -> String {
    DEFAULT_PROBE_PATH.to_owned()
}

impl OAuthSettings {
    /// Reads provider settings from `config`.
    ///
    /// Returns `Ok(None)` when the client credentials are absent, which means
    /// the plugin has not been configured for OAuth yet.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Configuration`] when credentials are present
    /// but other settings are missing, and [`CredentialError::InvalidSettings`]
    /// when an endpoint is not an absolute URL.
    pub fn from_config(config: &PluginConfig) -> Result<Option<Self>, CredentialError> {
        if config.get_str("client_id").is_none() || config.get_str("client_secret").is_none() {
            return Ok(None);
        }
        let settings: Self = config.parse_as()?;
        settings.validate()?;
        Ok(Some(settings))
    }

    /// Checks that every endpoint is an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidSettings`] naming the bad field.
    pub fn validate(&self) -> Result<(), CredentialError> {
        for (field, value) in [
            ("authorize_url", &self.authorize_url),
            ("token_url", &self.token_url),
            ("redirect_uri", &self.redirect_uri),
            ("api_base_url", &self.api_base_url),
        ] {
            Url::parse(value).map_err(|error| CredentialError::InvalidSettings {
                field,
                message: error.to_string(),
            })?;
        }
        Ok(())
    }

    /// Joins `path` onto [`Self::api_base_url`].
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Builds the consent URL the user must open.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidSettings`] when
    /// [`Self::authorize_url`] is not a URL.
    pub fn authorization_url(&self) -> Result<String, CredentialError> {
        let mut url =
            Url::parse(&self.authorize_url).map_err(|error| CredentialError::InvalidSettings {
                field: "authorize_url",
                message: error.to_string(),
            })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("response_type", "code")
                .append_pair("redirect_uri", &self.redirect_uri);
            if !self.scope.trim().is_empty() {
                query.append_pair("scope", &self.scope);
            }
        }
        Ok(url.into())
    }
}

#[cfg(test)]
pub(crate) fn sample_settings(base: &str) -> OAuthSettings {
    OAuthSettings {
        client_id: String::from("client-123"),
        client_secret: String::from("secret-456"),
        authorize_url: format!("{base}/authorize"),
        token_url: format!("{base}/api/token"),
        redirect_uri: String::from("http://localhost:8888/callback"),
        scope: String::from("user-read-playback-state user-modify-playback-state"),
        api_base_url: format!("{base}/v1"),
        probe_path: String::from(DEFAULT_PROBE_PATH),
    }
}
