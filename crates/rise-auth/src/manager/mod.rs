//! Credential lifecycle: consent, code exchange, refresh and retry.
//!
//! [`CredentialManager`] owns the persisted tokens of one plugin. It is driven
//! from the single dispatch thread, so it needs no locking. Protected calls go
//! through [`CredentialManager::call_authenticated`], which refreshes at most
//! once per call and retries at most once.

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::CredentialError;
use crate::pending::{PENDING_AUTH_KEY, PendingAuthorization};
use crate::settings::OAuthSettings;
use crate::store::{CredentialStore, StoredTokens};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

const MANAGER_TARGET: &str = "rise_auth::manager";

/// Outcome of [`CredentialManager::ensure_authorized`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// A usable access token is held.
    Authorized,
    /// The user has to grant consent in a browser.
    NeedsUserAction {
        /// Instruction to show the user.
        message: String,
        /// Consent URL to open.
        authorization_url: String,
    },
}

impl Authorization {
    /// Whether an access token is held.
    #[must_use]
    pub const fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn parse(response: &HttpResponse) -> Option<Self> {
        response.json().ok()
    }

    fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|token| !token.is_empty())
    }

    fn refresh_token(&self) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

/// Owns the bearer credentials of one plugin.
#[derive(Debug)]
pub struct CredentialManager<T, S> {
    settings: OAuthSettings,
    transport: T,
    store: S,
    pending: Option<PendingAuthorization>,
    tokens: StoredTokens,
    loaded: bool,
}

impl<T, S> CredentialManager<T, S>
where
    T: HttpTransport,
    S: CredentialStore,
{
    /// Creates a manager. Tokens are loaded lazily on first use.
    #[must_use]
    pub fn new(settings: OAuthSettings, transport: T, store: S) -> Self {
        Self {
            settings,
            transport,
            store,
            pending: None,
            tokens: StoredTokens::default(),
            loaded: false,
        }
    }

    /// Consumes callback URLs pasted into `pending` during
    /// [`Self::ensure_authorized`].
    #[must_use]
    pub fn with_pending_authorization(mut self, pending: PendingAuthorization) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Provider settings.
    #[must_use]
    pub const fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    /// HTTP transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Token store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Tokens currently held in memory.
    #[must_use]
    pub const fn tokens(&self) -> &StoredTokens {
        &self.tokens
    }

    /// Whether an access token is held. Does not contact the provider.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.tokens.access_token().is_some()
    }

    /// Reloads the persisted tokens.
    ///
    /// # Errors
    ///
    /// Returns the store's error when the tokens cannot be read.
    pub fn load(&mut self) -> Result<(), CredentialError> {
        self.tokens = self.store.load()?;
        self.loaded = true;
        debug!(
            target: MANAGER_TARGET,
            access_token = self.tokens.access_token().is_some(),
            refresh_token = self.tokens.refresh_token().is_some(),
            "loaded stored tokens"
        );
        Ok(())
    }

    fn ensure_loaded(&mut self) -> Result<(), CredentialError> {
        if self.loaded {
            return Ok(());
        }
        self.load()
    }

    /// Consent URL for the configured provider.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidSettings`] when the authorize
    /// endpoint is not a URL.
    pub fn authorization_url(&self) -> Result<String, CredentialError> {
        self.settings.authorization_url()
    }

    /// Joins `path` onto the configured API base URL.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        self.settings.api_url(path)
    }

    /// Makes sure a usable access token is held.
    ///
    /// Stored tokens are loaded on first use. Without an access token a
    /// pending callback URL is consumed, then a stored refresh token is
    /// tried. When neither helps the user is asked to grant consent.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] when the store cannot be read or a
    /// pending callback URL fails to complete.
    pub fn ensure_authorized(&mut self) -> Result<Authorization, CredentialError> {
        self.ensure_loaded()?;
        if self.is_authorized() {
            return Ok(Authorization::Authorized);
        }

        if let Some(callback_url) = self.take_pending()? {
            info!(target: MANAGER_TARGET, "completing pending authorization");
            self.complete_authorization(&callback_url)?;
            return Ok(Authorization::Authorized);
        }

        if self.tokens.refresh_token().is_some() && self.refresh_access_token() {
            return Ok(Authorization::Authorized);
        }

        self.needs_user_action()
    }

    fn take_pending(&self) -> Result<Option<String>, CredentialError> {
        self.pending.as_ref().map_or(Ok(None), PendingAuthorization::take)
    }

    fn needs_user_action(&self) -> Result<Authorization, CredentialError> {
        let authorization_url = self.authorization_url()?;
        Ok(Authorization::NeedsUserAction {
            message: self.instruction(&authorization_url),
            authorization_url,
        })
    }

    fn instruction(&self, authorization_url: &str) -> String {
        let auth_file = self.pending.as_ref().map_or_else(
            || String::from("auth.json"),
            |pending| pending.path().display().to_string(),
        );
        format!(
            "Authorization required. Open {authorization_url} in a browser, approve access, \
             then save the URL you are redirected to in {auth_file} as \
             {{\"{PENDING_AUTH_KEY}\": \"<callback url>\"}} and initialize the plugin again."
        )
    }

    /// Exchanges the code in `callback_url` for tokens and verifies them.
    ///
    /// Both tokens are persisted before the probe call. A failed exchange, or
    /// a response without a refresh token, persists nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidCallbackUrl`],
    /// [`CredentialError::AuthorizationDenied`] or
    /// [`CredentialError::MissingAuthorizationCode`] for unusable callbacks,
    /// [`CredentialError::TokenExchange`] when the provider refuses the code,
    /// and [`CredentialError::Probe`] when the new access token is rejected.
    pub fn complete_authorization(&mut self, callback_url: &str) -> Result<(), CredentialError> {
        let code = authorization_code(callback_url)?;
        let request = HttpRequest::post(&self.settings.token_url).with_form([
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
        ]);
        let response =
            self.transport
                .send(&request)
                .map_err(|error| CredentialError::TokenExchange {
                    status: None,
                    message: error.to_string(),
                })?;
        if !response.is_success() {
            return Err(CredentialError::TokenExchange {
                status: Some(response.status),
                message: response.body,
            });
        }

        let (access_token, refresh_token) = TokenResponse::parse(&response)
            .and_then(|tokens| {
                Some((
                    tokens.access_token()?.to_owned(),
                    tokens.refresh_token()?.to_owned(),
                ))
            })
            .ok_or_else(|| CredentialError::TokenExchange {
                status: None,
                message: String::from("response did not include an access_token and refresh_token"),
            })?;

        let tokens = StoredTokens {
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            issued_at: now(),
        };
        self.store.save(&tokens)?;
        self.tokens = tokens;
        self.loaded = true;
        info!(target: MANAGER_TARGET, "authorization completed");

        self.probe()
    }

    fn probe(&self) -> Result<(), CredentialError> {
        let Some(token) = self.tokens.access_token() else {
            return Err(CredentialError::Probe {
                status: None,
                message: String::from("no access token held"),
            });
        };
        let request = HttpRequest::get(self.api_url(&self.settings.probe_path)).bearer(token);
        let response = self
            .transport
            .send(&request)
            .map_err(|error| CredentialError::Probe {
                status: None,
                message: error.to_string(),
            })?;
        if response.is_success() {
            Ok(())
        } else {
            Err(CredentialError::Probe {
                status: Some(response.status),
                message: response.body,
            })
        }
    }

    /// Sends `request` with the bearer token attached.
    ///
    /// A 401 triggers exactly one refresh and, only when it succeeds, exactly
    /// one retry. Whatever the last attempt returned is handed back
    /// unmodified, including error statuses.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::NotAuthorized`] when no token is held and
    /// none can be refreshed, and [`CredentialError::Transport`] when the
    /// request cannot be sent.
    pub fn call_authenticated(
        &mut self,
        request: &HttpRequest,
    ) -> Result<HttpResponse, CredentialError> {
        self.ensure_loaded()?;
        let mut refreshed = false;
        if self.tokens.access_token().is_none() {
            if !self.refresh_access_token() {
                return Err(self.not_authorized());
            }
            refreshed = true;
        }

        let response = self.send_with_bearer(request)?;
        if !response.is_unauthorized() || refreshed {
            return Ok(response);
        }

        debug!(
            target: MANAGER_TARGET,
            url = request.url(),
            "access token rejected; refreshing"
        );
        if !self.refresh_access_token() {
            return Ok(response);
        }
        self.send_with_bearer(request)
    }

    fn send_with_bearer(&self, request: &HttpRequest) -> Result<HttpResponse, CredentialError> {
        let token = self.tokens.access_token().unwrap_or_default();
        self.transport.send(&request.clone().bearer(token))
    }

    fn not_authorized(&self) -> CredentialError {
        let message = self.authorization_url().map_or_else(
            |error| format!("Authorization required: {error}"),
            |url| self.instruction(&url),
        );
        CredentialError::NotAuthorized { message }
    }

    /// Mints a new access token from the stored refresh token.
    ///
    /// Returns `false`, leaving the held tokens untouched, when there is no
    /// refresh token or the provider refuses it. A rotated refresh token in
    /// the response replaces the stored one.
    pub fn refresh_access_token(&mut self) -> bool {
        if let Err(error) = self.ensure_loaded() {
            warn!(target: MANAGER_TARGET, %error, "cannot refresh without stored tokens");
            return false;
        }
        let Some(refresh_token) = self.tokens.refresh_token().map(str::to_owned) else {
            debug!(target: MANAGER_TARGET, "no refresh token stored");
            return false;
        };

        let request = HttpRequest::post(&self.settings.token_url).with_form([
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
        ]);
        let response = match self.transport.send(&request) {
            Ok(response) => response,
            Err(error) => {
                warn!(target: MANAGER_TARGET, %error, "token refresh failed");
                return false;
            }
        };
        if !response.is_success() {
            warn!(
                target: MANAGER_TARGET,
                status = response.status,
                "token refresh rejected"
            );
            return false;
        }
        let Some(parsed) = TokenResponse::parse(&response) else {
            warn!(target: MANAGER_TARGET, "token refresh returned an unreadable body");
            return false;
        };
        let Some(access_token) = parsed.access_token() else {
            warn!(target: MANAGER_TARGET, "token refresh returned no access_token");
            return false;
        };

        let tokens = StoredTokens {
            access_token: Some(access_token.to_owned()),
            refresh_token: Some(
                parsed
                    .refresh_token()
                    .map_or(refresh_token, str::to_owned),
            ),
            issued_at: now(),
        };
        if let Err(error) = self.store.save(&tokens) {
            warn!(target: MANAGER_TARGET, %error, "refreshed token could not be persisted");
        }
        self.tokens = tokens;
        info!(target: MANAGER_TARGET, "access token refreshed");
        true
    }

    /// Discards every stored token and asks for fresh consent.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] when the store cannot be cleared or the
    /// consent URL cannot be built.
    pub fn reauthorize(&mut self) -> Result<Authorization, CredentialError> {
        self.store.clear()?;
        self.tokens = StoredTokens::default();
        self.loaded = true;
        info!(target: MANAGER_TARGET, "stored tokens discarded");
        self.needs_user_action()
    }
}

/// Converts a non-2xx response into [`CredentialError::Upstream`].
///
/// # Errors
///
/// Returns [`CredentialError::Upstream`] carrying the status and body.
pub fn ensure_success(response: HttpResponse) -> Result<HttpResponse, CredentialError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(CredentialError::Upstream {
            status: response.status,
            body: response.body,
        })
    }
}

fn authorization_code(callback_url: &str) -> Result<String, CredentialError> {
    let url = Url::parse(callback_url.trim()).map_err(|source| {
        CredentialError::InvalidCallbackUrl {
            url: callback_url.to_owned(),
            source,
        }
    })?;
    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => {
                return Err(CredentialError::AuthorizationDenied {
                    reason: value.into_owned(),
                });
            }
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            _ => {}
        }
    }
    code.ok_or(CredentialError::MissingAuthorizationCode)
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
