//! Authentication spaces.
//!
//! A `Space` declares the realms, security provisions, and schemes a
//! subtree of paths affords; spaces are mapped hereditarily by path
//! pattern, with the deepest mapped ancestor governing a request.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cors::UniversalizableSet;
use crate::mappings::HereditaryWebResourcePathMap;

/// The client proves its identity with each request.
pub const SECPROV_CLIENT_AUTH: ProvisionSet = ProvisionSet(1);

/// The client's secret is encrypted in transit.
pub const SECPROV_CLIENT_ENCRYPTED_SECRET: ProvisionSet = ProvisionSet(2);

/// A set of security provisions, one bit each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvisionSet(pub u32);

impl ProvisionSet {
    pub const NONE: ProvisionSet = ProvisionSet(0);

    pub fn contains(self, other: ProvisionSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for ProvisionSet {
    type Output = ProvisionSet;

    fn bitor(self, rhs: ProvisionSet) -> ProvisionSet {
        ProvisionSet(self.0 | rhs.0)
    }
}

impl fmt::Display for ProvisionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(SECPROV_CLIENT_AUTH) {
            names.push("client auth");
        }
        if self.contains(SECPROV_CLIENT_ENCRYPTED_SECRET) {
            names.push("client encrypted secret");
        }
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join(", "))
        }
    }
}

/// An authentication scheme a space may afford.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// HTTP Basic credentials in the `Authorization` header.
    Basic,
    /// Credentials submitted as login method arguments, answered with a
    /// session cookie.
    SessionLogin,
    /// A previously issued session cookie.
    SessionRecall,
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthScheme::Basic => "basic",
            AuthScheme::SessionLogin => "session_login",
            AuthScheme::SessionRecall => "session_recall",
        };
        write!(f, "{name}")
    }
}

/// What authentication a subtree of paths affords.
#[derive(Debug, Clone)]
pub struct Space {
    /// Realms in which tokens may be verified.
    pub realms: UniversalizableSet<String>,
    /// Provisions required of the exchange.
    pub provisions: ProvisionSet,
    /// Afforded schemes, in preference order.
    pub schemes: Vec<AuthScheme>,
}

impl Space {
    pub fn new(
        realms: UniversalizableSet<String>,
        provisions: ProvisionSet,
        schemes: Vec<AuthScheme>,
    ) -> Self {
        Self {
            realms,
            provisions,
            schemes,
        }
    }

    /// A space affording HTTP Basic authentication in one realm.
    pub fn basic_realm(realm: impl Into<String>) -> Self {
        Self {
            realms: [realm.into()].into_iter().collect(),
            provisions: SECPROV_CLIENT_AUTH,
            schemes: vec![AuthScheme::Basic],
        }
    }

    /// A space affording session login at a login resource and session
    /// recall everywhere it covers.
    pub fn session_realm(realm: impl Into<String>) -> Self {
        Self {
            realms: [realm.into()].into_iter().collect(),
            provisions: SECPROV_CLIENT_AUTH,
            schemes: vec![AuthScheme::SessionLogin, AuthScheme::SessionRecall],
        }
    }

    /// The finite realm names, for challenges and error reporting.
    pub fn realm_names(&self) -> Vec<String> {
        self.realms.iter().cloned().collect()
    }
}

/// Hereditary map from path patterns to authentication spaces.
pub type SpaceMap = HereditaryWebResourcePathMap<Space>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provision_set_display() {
        assert_eq!(ProvisionSet::NONE.to_string(), "none");
        assert_eq!(SECPROV_CLIENT_AUTH.to_string(), "client auth");
        assert_eq!(
            (SECPROV_CLIENT_AUTH | SECPROV_CLIENT_ENCRYPTED_SECRET).to_string(),
            "client auth, client encrypted secret"
        );
    }

    #[test]
    fn test_space_realm_names() {
        let space = Space::basic_realm("trestle");
        assert_eq!(space.realm_names(), vec!["trestle".to_string()]);
        assert_eq!(space.schemes, vec![AuthScheme::Basic]);

        let universal = Space::new(
            UniversalizableSet::Universal,
            ProvisionSet::NONE,
            vec![AuthScheme::Basic],
        );
        assert!(universal.realm_names().is_empty());
    }

    #[test]
    fn test_space_map_deepest_wins() {
        let mut map = SpaceMap::new();
        map.insert("/", Space::basic_realm("outer")).unwrap();
        map.insert("/inner", Space::basic_realm("inner")).unwrap();
        let space = map.resolve("/inner/deep").unwrap();
        assert_eq!(space.realm_names(), vec!["inner".to_string()]);
    }
}
