//! HTTP Basic authentication connectors.
//!
//! The scanner pulls `user` and `password` tokens out of the
//! `Authorization` header; the clerk answers missing or rejected tokens
//! with `WWW-Authenticate: Basic` challenges, one per realm.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;

use trestle_core::auth::{
    AuthRequestInfo, Clerk, ClerkDirectives, RequestAuthInfo, ScanError, Scanner, TokenMap,
};
use trestle_types::error::WebError;

static AUTHORIZATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*Basic\s*(?P<creds_base64>[^\s]*)").expect("valid Authorization header regex")
});

/// Scans `Authorization: Basic` credentials into `user` and `password`
/// tokens.
pub struct HttpBasicScanner;

impl Scanner for HttpBasicScanner {
    fn scan(&self, request: &AuthRequestInfo) -> Result<Option<TokenMap>, ScanError> {
        let Some(header) = request.authorization.as_deref() else {
            return Err(ScanError::new("no Authorization header field"));
        };
        let Some(captures) = AUTHORIZATION_RE.captures(header) else {
            return Err(ScanError::new(
                "unrecognized Authorization header field value",
            ));
        };
        let creds_base64 = captures
            .name("creds_base64")
            .map(|m| m.as_str())
            .unwrap_or("");
        let creds = BASE64
            .decode(creds_base64)
            .map_err(|_| ScanError::new("credentials string is not a valid Base64 string"))?;
        let creds = String::from_utf8(creds)
            .map_err(|_| ScanError::new("invalid decoded credentials string"))?;
        // RFC 7617: everything after the first colon is the password.
        let Some((user, password)) = creds.split_once(':') else {
            return Err(ScanError::new("invalid decoded credentials string"));
        };
        let mut tokens = TokenMap::new();
        tokens.insert("user", user);
        tokens.insert("password", password);
        Ok(Some(tokens))
    }
}

/// Challenges clients with `WWW-Authenticate: Basic`, one challenge per
/// realm.
pub struct HttpBasicClerk;

impl HttpBasicClerk {
    fn challenges(realms: &[String]) -> ClerkDirectives {
        let mut directives = ClerkDirectives::default();
        if realms.is_empty() {
            // Universal or unnamed realms still warrant a challenge.
            directives.challenges.push("Basic realm=\"\"".to_string());
        } else {
            for realm in realms {
                directives
                    .challenges
                    .push(format!("Basic realm=\"{realm}\""));
            }
        }
        directives
    }
}

impl Clerk for HttpBasicClerk {
    fn solicit(&self, realms: &[String]) -> (ClerkDirectives, WebError) {
        (
            Self::challenges(realms),
            WebError::AuthTokensNotGiven {
                message: None,
                realms: realms.to_vec(),
                redirection: None,
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
            (
                Self::challenges(realms),
                Some(WebError::AuthTokensNotAccepted {
                    message: None,
                    realms: realms.to_vec(),
                    redirection: None,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_authorization(value: &str) -> AuthRequestInfo {
        AuthRequestInfo {
            authorization: Some(value.to_string()),
            ..AuthRequestInfo::default()
        }
    }

    #[test]
    fn test_scan_extracts_user_and_password() {
        let encoded = BASE64.encode("alice:opensesame");
        let request = request_with_authorization(&format!("Basic {encoded}"));
        let tokens = HttpBasicScanner.scan(&request).unwrap().unwrap();
        assert_eq!(tokens.get("user"), Some("alice"));
        assert_eq!(tokens.get("password"), Some("opensesame"));
    }

    #[test]
    fn test_scan_splits_on_first_colon_only() {
        let encoded = BASE64.encode("alice:open:sesame");
        let request = request_with_authorization(&format!("Basic {encoded}"));
        let tokens = HttpBasicScanner.scan(&request).unwrap().unwrap();
        assert_eq!(tokens.get("user"), Some("alice"));
        assert_eq!(tokens.get("password"), Some("open:sesame"));
    }

    #[test]
    fn test_scan_missing_header() {
        let err = HttpBasicScanner
            .scan(&AuthRequestInfo::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "no Authorization header field");
    }

    #[test]
    fn test_scan_wrong_scheme() {
        let request = request_with_authorization("Bearer sometoken");
        let err = HttpBasicScanner.scan(&request).unwrap_err();
        assert_eq!(err.to_string(), "unrecognized Authorization header field value");
    }

    #[test]
    fn test_scan_invalid_base64() {
        let request = request_with_authorization("Basic %%%");
        let err = HttpBasicScanner.scan(&request).unwrap_err();
        assert_eq!(
            err.to_string(),
            "credentials string is not a valid Base64 string"
        );
    }

    #[test]
    fn test_scan_credentials_without_colon() {
        let encoded = BASE64.encode("nocolonhere");
        let request = request_with_authorization(&format!("Basic {encoded}"));
        let err = HttpBasicScanner.scan(&request).unwrap_err();
        assert_eq!(err.to_string(), "invalid decoded credentials string");
    }

    #[test]
    fn test_solicit_challenges_each_realm() {
        let realms = vec!["inner".to_string(), "outer".to_string()];
        let (directives, error) = HttpBasicClerk.solicit(&realms);
        assert_eq!(
            directives.challenges,
            vec!["Basic realm=\"inner\"", "Basic realm=\"outer\""]
        );
        assert!(matches!(error, WebError::AuthTokensNotGiven { .. }));
    }

    #[test]
    fn test_solicit_without_finite_realms() {
        let (directives, _) = HttpBasicClerk.solicit(&[]);
        assert_eq!(directives.challenges, vec!["Basic realm=\"\""]);
    }

    #[test]
    fn test_confirm_accepted_is_quiet() {
        let mut info = RequestAuthInfo::new();
        info.accept();
        let (directives, error) = HttpBasicClerk.confirm(&info, &["trestle".to_string()]);
        assert!(directives.is_empty());
        assert!(error.is_none());
    }

    #[test]
    fn test_confirm_rejected_rechallenges() {
        let mut info = RequestAuthInfo::new();
        info.reject();
        let (directives, error) = HttpBasicClerk.confirm(&info, &["trestle".to_string()]);
        assert_eq!(directives.challenges, vec!["Basic realm=\"trestle\""]);
        assert!(matches!(error, Some(WebError::AuthTokensNotAccepted { .. })));
    }
}
