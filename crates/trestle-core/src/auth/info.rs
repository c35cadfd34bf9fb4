//! Per-request authentication state.

use serde::{Deserialize, Serialize};

use super::spaces::ProvisionSet;
use super::tokens::TokenMap;

/// The authentication state attached to a request.
///
/// A fresh info is unverified: `accepted` is `None` until a supplicant
/// delivers a verdict. Response envelopes report the realm, the `user`
/// token, and the verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestAuthInfo {
    /// Tokens gathered by the scanner, plus any the supplicant added.
    pub tokens: TokenMap,
    /// The realm the verdict applies to.
    pub realm: Option<String>,
    /// Security provisions in effect for the request.
    pub provisions: ProvisionSet,
    /// The supplicant's verdict; `None` means unverified.
    pub accepted: Option<bool>,
}

impl RequestAuthInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the tokens as verified and accepted.
    pub fn accept(&mut self) {
        self.accepted = Some(true);
    }

    /// Mark the tokens as verified and rejected.
    pub fn reject(&mut self) {
        self.accepted = Some(false);
    }

    /// Whether a supplicant has delivered a verdict.
    pub fn verified(&self) -> bool {
        self.accepted.is_some()
    }

    /// The authenticated user, from the `user` token.
    pub fn user(&self) -> Option<&str> {
        self.tokens.user()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_info_verdicts() {
        let mut info = RequestAuthInfo::new();
        assert!(!info.verified());
        assert_eq!(info.accepted, None);

        info.accept();
        assert!(info.verified());
        assert_eq!(info.accepted, Some(true));

        info.reject();
        assert!(info.verified());
        assert_eq!(info.accepted, Some(false));
    }

    #[test]
    fn test_auth_info_user_from_tokens() {
        let mut info = RequestAuthInfo::new();
        assert_eq!(info.user(), None);
        info.tokens.insert("user", "alice");
        assert_eq!(info.user(), Some("alice"));
    }
}
