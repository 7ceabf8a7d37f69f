//! Errors raised by the credential lifecycle.
//!
//! Every variant renders as user-facing text because handlers surface it to
//! the host verbatim. I/O and JSON errors are wrapped in `Arc` so the enum
//! stays small and cloneable.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use rise_config::ConfigError;
use rise_plugin::HandlerError;
use thiserror::Error;

/// Errors arising while acquiring, persisting, or using bearer credentials.
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    /// No usable credential exists and none could be obtained silently.
    #[error("{message}")]
    NotAuthorized {
        /// Instruction for the user.
        message: String,
    },
    /// The provider redirected back with an error instead of a code.
    #[error("authorization was denied: {reason}")]
    AuthorizationDenied {
        /// Error reported by the provider.
        reason: String,
    },
    /// The callback URL carried no `code` parameter.
    #[error("authorization code not found in the callback URL")]
    MissingAuthorizationCode,
    /// The callback URL could not be parsed.
    #[error("invalid callback URL '{url}': {source}")]
    InvalidCallbackUrl {
        /// Rejected URL.
        url: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// A provider setting was unusable.
    #[error("invalid OAuth setting '{field}': {message}")]
    InvalidSettings {
        /// Offending setting.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },
    /// Plugin configuration could not be read.
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    /// Exchanging the authorization code for tokens failed.
    #[error("token exchange failed{}: {message}", describe_status(.status.as_ref()))]
    TokenExchange {
        /// HTTP status, when the provider answered.
        status: Option<u16>,
        /// Response body or failure description.
        message: String,
    },
    /// The probe call made with freshly issued tokens failed.
    #[error("new access token was rejected{}: {message}", describe_status(.status.as_ref()))]
    Probe {
        /// HTTP status, when the API answered.
        status: Option<u16>,
        /// Response body or failure description.
        message: String,
    },
    /// The wrapped API answered with a non-success status.
    #[error("request failed with status {status}: {body}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// The HTTP request could not be completed.
    #[error("request to '{url}' failed: {message}")]
    Transport {
        /// Target URL.
        url: String,
        /// Failure description.
        message: String,
    },
    /// Reading or writing the token file failed.
    #[error("failed to access credential store '{path}': {source}")]
    Store {
        /// Token file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The token file could not be encoded.
    #[error("failed to encode credential store '{path}': {source}")]
    StoreFormat {
        /// Token file path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: Arc<serde_json::Error>,
    },
    /// The pending authorisation file could not be used.
    #[error("failed to use pending authorization file '{path}': {message}")]
    PendingAuthorization {
        /// Pending authorisation file path.
        path: PathBuf,
        /// Failure description.
        message: String,
    },
}

fn describe_status(status: Option<&u16>) -> String {
    status
        .map(|status| format!(" with status {status}"))
        .unwrap_or_default()
}

impl From<CredentialError> for HandlerError {
    fn from(error: CredentialError) -> Self {
        match error {
            CredentialError::NotAuthorized { message } => Self::Authorization { message },
            CredentialError::Upstream { status, body } => Self::Upstream {
                status,
                message: body,
            },
            error @ (CredentialError::AuthorizationDenied { .. }
            | CredentialError::MissingAuthorizationCode
            | CredentialError::InvalidCallbackUrl { .. }) => Self::Authorization {
                message: error.to_string(),
            },
            other => Self::Failed {
                message: other.to_string(),
            },
        }
    }
}
