//! The authentication algorithm.

use tracing::debug;

use trestle_types::error::WebError;

use super::connector::{AuthRequestInfo, ClerkDirectives, ConnectorChain};
use super::info::RequestAuthInfo;
use super::spaces::{AuthScheme, Space};

/// What authentication produced for one request.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    /// The request's auth info, verdict included when one was reached.
    pub auth_info: RequestAuthInfo,
    /// Response side effects from the deciding clerk.
    pub directives: ClerkDirectives,
    /// The error to respond with instead of dispatching, if any.
    pub error: Option<WebError>,
}

impl AuthOutcome {
    /// Whether dispatch may proceed to the web method.
    pub fn proceed(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs connector chains against requests per the governing space.
pub struct Authenticator {
    chains: Vec<ConnectorChain>,
}

impl Authenticator {
    pub fn new() -> Self {
        Self { chains: Vec::new() }
    }

    /// Register a chain. One chain per scheme; registering a scheme again
    /// replaces its chain.
    pub fn register(&mut self, chain: ConnectorChain) {
        if let Some(existing) = self
            .chains
            .iter_mut()
            .find(|existing| existing.scheme == chain.scheme)
        {
            *existing = chain;
        } else {
            self.chains.push(chain);
        }
    }

    pub fn chain(&self, scheme: AuthScheme) -> Option<&ConnectorChain> {
        self.chains.iter().find(|chain| chain.scheme == scheme)
    }

    pub fn schemes(&self) -> Vec<AuthScheme> {
        self.chains.iter().map(|chain| chain.scheme).collect()
    }

    /// Authenticate a request governed by `space`.
    ///
    /// Schemes are tried in the space's preference order. The first chain
    /// whose scanner yields tokens decides the outcome; a scan failure is
    /// recoverable and counts as no tokens. With no tokens from any
    /// chain, the first usable chain's clerk solicits.
    pub async fn authenticate(&self, space: &Space, request: &AuthRequestInfo) -> AuthOutcome {
        let realms = space.realm_names();
        let mut soliciting_chain: Option<&ConnectorChain> = None;

        for scheme in &space.schemes {
            let Some(chain) = self.chain(*scheme) else {
                continue;
            };
            if soliciting_chain.is_none() {
                soliciting_chain = Some(chain);
            }

            let tokens = match chain.scanner.scan(request) {
                Ok(Some(tokens)) => tokens,
                Ok(None) => continue,
                Err(err) => {
                    debug!(scheme = %chain.scheme, reason = %err, "Scan yielded no tokens");
                    continue;
                }
            };

            let mut auth_info = match chain.supplicant.verify(&tokens).await {
                Ok(info) => info,
                Err(err) => {
                    return AuthOutcome {
                        auth_info: RequestAuthInfo::new(),
                        directives: ClerkDirectives::default(),
                        error: Some(WebError::Unhandled {
                            message: err.to_string(),
                            traceback: None,
                        }),
                    };
                }
            };
            if auth_info.realm.is_none() {
                auth_info.realm = realms.first().cloned();
            }

            let (directives, error) = chain.clerk.confirm(&auth_info, &realms);
            match auth_info.accepted {
                Some(true) => debug!(
                    scheme = %chain.scheme,
                    user = %auth_info.user().unwrap_or("-"),
                    "Authentication accepted"
                ),
                _ => debug!(scheme = %chain.scheme, "Authentication rejected"),
            }
            return AuthOutcome {
                auth_info,
                directives,
                error,
            };
        }

        match soliciting_chain {
            Some(chain) => {
                let (directives, error) = chain.clerk.solicit(&realms);
                AuthOutcome {
                    auth_info: RequestAuthInfo::new(),
                    directives,
                    error: Some(error),
                }
            }
            None => AuthOutcome {
                auth_info: RequestAuthInfo::new(),
                directives: ClerkDirectives::default(),
                error: Some(WebError::AuthTokensNotGiven {
                    message: None,
                    realms,
                    redirection: None,
                }),
            },
        }
    }
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use super::super::connector::{Clerk, ScanError, Scanner, Supplicant, SupplicantError};
    use super::super::tokens::TokenMap;

    struct StaticScanner(Option<TokenMap>);

    impl Scanner for StaticScanner {
        fn scan(&self, _request: &AuthRequestInfo) -> Result<Option<TokenMap>, ScanError> {
            Ok(self.0.clone())
        }
    }

    struct FailingScanner;

    impl Scanner for FailingScanner {
        fn scan(&self, _request: &AuthRequestInfo) -> Result<Option<TokenMap>, ScanError> {
            Err(ScanError::new("no Authorization header field"))
        }
    }

    struct MapSupplicant {
        users: BTreeMap<String, String>,
    }

    impl Supplicant for MapSupplicant {
        async fn verify(&self, tokens: &TokenMap) -> Result<RequestAuthInfo, SupplicantError> {
            let mut info = RequestAuthInfo::new();
            match tokens.get("user") {
                Some(user) => {
                    info.tokens.insert("user", user);
                    if self.users.get(user).map(String::as_str) == tokens.get("password") {
                        info.accept();
                    } else {
                        info.reject();
                    }
                }
                None => info.reject(),
            }
            Ok(info)
        }
    }

    struct BasicClerk;

    impl Clerk for BasicClerk {
        fn solicit(&self, realms: &[String]) -> (ClerkDirectives, WebError) {
            let mut directives = ClerkDirectives::default();
            for realm in realms {
                directives
                    .challenges
                    .push(format!("Basic realm=\"{realm}\""));
            }
            (
                directives,
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
                let (directives, _) = self.solicit(realms);
                (
                    directives,
                    Some(WebError::AuthTokensNotAccepted {
                        message: None,
                        realms: realms.to_vec(),
                        redirection: None,
                    }),
                )
            }
        }
    }

    fn credentials(user: &str, password: &str) -> TokenMap {
        let mut tokens = TokenMap::new();
        tokens.insert("user", user);
        tokens.insert("password", password);
        tokens
    }

    fn users() -> BTreeMap<String, String> {
        [("alice".to_string(), "wonderland".to_string())].into()
    }

    fn authenticator_with(scanner: impl Scanner + 'static) -> Authenticator {
        let mut authenticator = Authenticator::new();
        authenticator.register(ConnectorChain::new(
            AuthScheme::Basic,
            scanner,
            MapSupplicant { users: users() },
            BasicClerk,
        ));
        authenticator
    }

    #[tokio::test]
    async fn test_accepted_tokens_carry_realm_and_user() {
        let authenticator =
            authenticator_with(StaticScanner(Some(credentials("alice", "wonderland"))));
        let outcome = authenticator
            .authenticate(&Space::basic_realm("trestle"), &AuthRequestInfo::default())
            .await;
        assert!(outcome.proceed());
        assert_eq!(outcome.auth_info.accepted, Some(true));
        assert_eq!(outcome.auth_info.realm.as_deref(), Some("trestle"));
        assert_eq!(outcome.auth_info.user(), Some("alice"));
        assert!(outcome.directives.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_tokens_rechallenge() {
        let authenticator = authenticator_with(StaticScanner(Some(credentials("alice", "nope"))));
        let outcome = authenticator
            .authenticate(&Space::basic_realm("trestle"), &AuthRequestInfo::default())
            .await;
        assert!(!outcome.proceed());
        assert_eq!(outcome.auth_info.accepted, Some(false));
        assert!(matches!(
            outcome.error,
            Some(WebError::AuthTokensNotAccepted { .. })
        ));
        assert_eq!(outcome.directives.challenges, ["Basic realm=\"trestle\""]);
    }

    #[tokio::test]
    async fn test_no_tokens_solicits() {
        let authenticator = authenticator_with(StaticScanner(None));
        let outcome = authenticator
            .authenticate(&Space::basic_realm("trestle"), &AuthRequestInfo::default())
            .await;
        assert!(matches!(
            outcome.error,
            Some(WebError::AuthTokensNotGiven { .. })
        ));
        assert_eq!(outcome.directives.challenges, ["Basic realm=\"trestle\""]);
        assert_eq!(outcome.auth_info.accepted, None);
    }

    #[tokio::test]
    async fn test_scan_failure_counts_as_no_tokens() {
        let authenticator = authenticator_with(FailingScanner);
        let outcome = authenticator
            .authenticate(&Space::basic_realm("trestle"), &AuthRequestInfo::default())
            .await;
        assert!(matches!(
            outcome.error,
            Some(WebError::AuthTokensNotGiven { .. })
        ));
    }

    #[tokio::test]
    async fn test_space_without_registered_chain() {
        let authenticator = Authenticator::new();
        let outcome = authenticator
            .authenticate(&Space::basic_realm("trestle"), &AuthRequestInfo::default())
            .await;
        assert!(matches!(
            outcome.error,
            Some(WebError::AuthTokensNotGiven { .. })
        ));
        assert!(outcome.directives.is_empty());
    }
}
