//! Cookie-session authentication connectors.
//!
//! Two chains cooperate. The login chain scans `user` and `password`
//! from a login method's arguments, and its clerk answers an accepted
//! login with a `session_id` cookie (and an optional redirection to
//! wherever the client was headed). The recall chain scans that cookie
//! back out on later requests; its clerk redirects to the login resource
//! whenever the session is missing or unknown.

use serde_json::Value;

use trestle_core::auth::{
    AuthRequestInfo, Clerk, ClerkDirectives, RequestAuthInfo, ScanError, Scanner, TokenMap,
};
use trestle_types::error::WebError;

/// The cookie that carries the session id.
pub const SESSION_ID_COOKIE: &str = "session_id";

fn login_redirection(login_uri: &str, message: &str) -> Option<Box<WebError>> {
    Some(Box::new(WebError::ResponseRedirection {
        loc: login_uri.to_string(),
        message: Some(message.to_string()),
    }))
}

// --- Login ------------------------------------------------------------

/// Scans login credentials from the request's method arguments.
pub struct SessionLoginScanner;

impl Scanner for SessionLoginScanner {
    fn scan(&self, request: &AuthRequestInfo) -> Result<Option<TokenMap>, ScanError> {
        let mut tokens = TokenMap::new();
        for name in ["user", "password"] {
            match request.method_args.get(name).and_then(Value::as_str) {
                Some(value) => tokens.insert(name, value),
                None => {
                    return Err(ScanError::new(format!(
                        "missing session login method argument '{name}'"
                    )));
                }
            }
        }
        if let Some(redirect) = request.method_args.get("redirect").and_then(Value::as_str) {
            tokens.insert("redirect", redirect);
        }
        Ok(Some(tokens))
    }
}

/// Confirms login verdicts: a cookie for the new session, redirections
/// for everything else.
pub struct SessionLoginClerk {
    login_uri: String,
}

impl SessionLoginClerk {
    pub fn new(login_uri: impl Into<String>) -> Self {
        Self {
            login_uri: login_uri.into(),
        }
    }
}

impl Clerk for SessionLoginClerk {
    fn solicit(&self, realms: &[String]) -> (ClerkDirectives, WebError) {
        (
            ClerkDirectives::default(),
            WebError::AuthTokensNotGiven {
                message: None,
                realms: realms.to_vec(),
                redirection: login_redirection(&self.login_uri, "login is required to proceed"),
            },
        )
    }

    fn confirm(
        &self,
        auth_info: &RequestAuthInfo,
        realms: &[String],
    ) -> (ClerkDirectives, Option<WebError>) {
        let mut directives = ClerkDirectives::default();
        if auth_info.accepted == Some(true) {
            if let Some(session_id) = auth_info.tokens.session_id() {
                directives
                    .set_cookies
                    .push((SESSION_ID_COOKIE.to_string(), session_id.to_string()));
            }
            // A `redirect` token sends the client onward even though the
            // login itself succeeded.
            let error =
                auth_info
                    .tokens
                    .get("redirect")
                    .map(|redirect| WebError::ResponseRedirection {
                        loc: redirect.to_string(),
                        message: Some("login succeeded".to_string()),
                    });
            (directives, error)
        } else {
            (
                directives,
                Some(WebError::AuthTokensNotAccepted {
                    message: None,
                    realms: realms.to_vec(),
                    redirection: login_redirection(
                        &self.login_uri,
                        "unrecognized login credentials; login is required to proceed",
                    ),
                }),
            )
        }
    }
}

// --- Recall -----------------------------------------------------------

/// Scans the session cookie into a `session_id` token.
pub struct SessionRecallScanner;

impl Scanner for SessionRecallScanner {
    fn scan(&self, request: &AuthRequestInfo) -> Result<Option<TokenMap>, ScanError> {
        match request.cookies.get(SESSION_ID_COOKIE) {
            Some(session_id) => {
                let mut tokens = TokenMap::new();
                tokens.insert("session_id", session_id.as_str());
                Ok(Some(tokens))
            }
            None => Err(ScanError::new(format!(
                "missing session recall cookie '{SESSION_ID_COOKIE}'"
            ))),
        }
    }
}

/// Redirects to the login resource whenever a session cannot vouch for
/// the client.
pub struct SessionRecallClerk {
    login_uri: String,
}

impl SessionRecallClerk {
    pub fn new(login_uri: impl Into<String>) -> Self {
        Self {
            login_uri: login_uri.into(),
        }
    }
}

impl Clerk for SessionRecallClerk {
    fn solicit(&self, realms: &[String]) -> (ClerkDirectives, WebError) {
        (
            ClerkDirectives::default(),
            WebError::AuthTokensNotGiven {
                message: None,
                realms: realms.to_vec(),
                redirection: login_redirection(&self.login_uri, "login is required"),
            },
        )
    }

    fn confirm(
        &self,
        auth_info: &RequestAuthInfo,
        realms: &[String],
    ) -> (ClerkDirectives, Option<WebError>) {
        if auth_info.accepted == Some(true) {
            (ClerkDirectives::default(), None)
        } else {
            // The cookie named a dead session; clear it so the client
            // stops presenting it.
            let mut directives = ClerkDirectives::default();
            directives.clear_cookies.push(SESSION_ID_COOKIE.to_string());
            (
                directives,
                Some(WebError::AuthTokensNotAccepted {
                    message: None,
                    realms: realms.to_vec(),
                    redirection: login_redirection(
                        &self.login_uri,
                        "unrecognized authentication session ID; login is required to proceed",
                    ),
                }),
            )
        }
    }
}
