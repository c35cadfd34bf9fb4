//! Connector traits joining the framework to authentication transports
//! and backends.
//!
//! A connector chain serves one scheme: the scanner pulls tokens out of
//! the request, the supplicant verifies them against a backing store, and
//! the clerk tells the client what happened (challenges, cookies,
//! redirections). Scanners and clerks are transport-facing and sync;
//! supplicants reach backends and are async.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};
use thiserror::Error;

use trestle_types::error::WebError;

use super::info::RequestAuthInfo;
use super::spaces::AuthScheme;
use super::tokens::TokenMap;

/// The request facts scanners inspect.
#[derive(Debug, Clone, Default)]
pub struct AuthRequestInfo {
    /// The `Authorization` header, as received.
    pub authorization: Option<String>,
    /// Request cookies by name.
    pub cookies: BTreeMap<String, String>,
    /// The extracted method arguments, for form-based login.
    pub method_args: Map<String, Value>,
}

/// A scanner could not extract tokens from the request.
///
/// Scan errors are recoverable: the algorithm treats them as "no tokens"
/// and falls through to the next scheme or to solicitation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ScanError {
    pub message: String,
}

impl ScanError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A supplicant's backing store failed; the verdict is unknowable.
#[derive(Debug, Clone, Error)]
#[error("authentication backend failure: {message}")]
pub struct SupplicantError {
    pub message: String,
}

impl SupplicantError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Extracts authentication tokens from a request.
pub trait Scanner: Send + Sync {
    /// Pull this scheme's tokens out of the request. `Ok(None)` means the
    /// request does not speak this scheme at all.
    fn scan(&self, request: &AuthRequestInfo) -> Result<Option<TokenMap>, ScanError>;
}

/// Verifies scanned tokens against a backing store.
pub trait Supplicant: Send + Sync {
    /// Rule on the tokens. The returned info carries the verdict in
    /// `accepted` and whatever tokens the backend vouches for.
    fn verify(
        &self,
        tokens: &TokenMap,
    ) -> impl Future<Output = Result<RequestAuthInfo, SupplicantError>> + Send;
}

/// Object-safe version of [`Supplicant`] with boxed futures.
pub trait SupplicantDyn: Send + Sync {
    fn verify_boxed<'a>(
        &'a self,
        tokens: &'a TokenMap,
    ) -> Pin<Box<dyn Future<Output = Result<RequestAuthInfo, SupplicantError>> + Send + 'a>>;
}

/// Blanket implementation: any `Supplicant` automatically implements
/// `SupplicantDyn`.
impl<T: Supplicant> SupplicantDyn for T {
    fn verify_boxed<'a>(
        &'a self,
        tokens: &'a TokenMap,
    ) -> Pin<Box<dyn Future<Output = Result<RequestAuthInfo, SupplicantError>> + Send + 'a>> {
        Box::pin(self.verify(tokens))
    }
}

/// Type-erased supplicant, so chains can mix backend implementations.
pub struct BoxSupplicant {
    inner: Box<dyn SupplicantDyn + Send + Sync>,
}

impl BoxSupplicant {
    pub fn new<T: Supplicant + 'static>(supplicant: T) -> Self {
        Self {
            inner: Box::new(supplicant),
        }
    }

    pub async fn verify(&self, tokens: &TokenMap) -> Result<RequestAuthInfo, SupplicantError> {
        self.inner.verify_boxed(tokens).await
    }
}

/// Side effects a clerk asks the backend to apply to the response.
#[derive(Debug, Clone, Default)]
pub struct ClerkDirectives {
    /// `WWW-Authenticate` challenge values.
    pub challenges: Vec<String>,
    /// Cookies to set, as (name, value).
    pub set_cookies: Vec<(String, String)>,
    /// Cookie names to clear.
    pub clear_cookies: Vec<String>,
}

impl ClerkDirectives {
    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty() && self.set_cookies.is_empty() && self.clear_cookies.is_empty()
    }
}

/// Communicates authentication outcomes back to the client.
///
/// Clerks own the client-facing errors: a solicitation or rejection error
/// may carry a redirection (session login pages) or rely on the challenge
/// directives alone (HTTP Basic).
pub trait Clerk: Send + Sync {
    /// Challenge a client that presented no tokens. Returns the response
    /// directives and the error to raise.
    fn solicit(&self, realms: &[String]) -> (ClerkDirectives, WebError);

    /// Communicate a verdict. A rejection, or an accepted login that must
    /// redirect, returns the error to respond with.
    fn confirm(
        &self,
        auth_info: &RequestAuthInfo,
        realms: &[String],
    ) -> (ClerkDirectives, Option<WebError>);
}

/// One scheme's connector lineup.
pub struct ConnectorChain {
    pub scheme: AuthScheme,
    pub scanner: Box<dyn Scanner>,
    pub supplicant: BoxSupplicant,
    pub clerk: Box<dyn Clerk>,
}

impl ConnectorChain {
    pub fn new(
        scheme: AuthScheme,
        scanner: impl Scanner + 'static,
        supplicant: impl Supplicant + 'static,
        clerk: impl Clerk + 'static,
    ) -> Self {
        Self {
            scheme,
            scanner: Box::new(scanner),
            supplicant: BoxSupplicant::new(supplicant),
            clerk: Box::new(clerk),
        }
    }
}
