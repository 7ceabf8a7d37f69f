//! Bearer credential lifecycle for Rise plugins.
//!
//! Plugins that wrap an OAuth-protected API hand their provider settings to
//! a [`CredentialManager`]. The manager loads persisted tokens, walks the
//! user through consent when none exist, exchanges the returned code, and
//! attaches the bearer token to every protected call. A call rejected with
//! 401 triggers exactly one refresh and at most one retry.
//!
//! Network access goes through [`HttpTransport`] and persistence through
//! [`CredentialStore`], so handlers can be tested without either.

pub mod error;
pub mod manager;
pub mod pending;
pub mod settings;
pub mod store;
pub mod transport;

#[cfg(test)]
mod tests;

pub use self::error::CredentialError;
pub use self::manager::{Authorization, CredentialManager, ensure_success};
pub use self::pending::{PENDING_AUTH_KEY, PendingAuthorization};
pub use self::settings::{DEFAULT_PROBE_PATH, OAuthSettings};
#[cfg(any(test, feature = "test-support"))]
pub use self::store::MemoryCredentialStore;
pub use self::store::{CredentialStore, FileCredentialStore, StoredTokens};
pub use self::transport::{
    DEFAULT_REQUEST_TIMEOUT, HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody,
    ReqwestTransport,
};
