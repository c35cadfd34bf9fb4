//! Authentication tokens.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An ordered map of authentication tokens.
///
/// Token names are scheme-specific (`user`, `password`, `session_id`,
/// `redirect`, ...); values are always strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenMap(BTreeMap<String, String>);

impl TokenMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// The `user` token, when present.
    pub fn user(&self) -> Option<&str> {
        self.get("user")
    }

    /// The `session_id` token, when present.
    pub fn session_id(&self) -> Option<&str> {
        self.get("session_id")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for TokenMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_map_typed_views() {
        let mut tokens = TokenMap::new();
        tokens.insert("user", "alice");
        tokens.insert("session_id", "abc123");
        assert_eq!(tokens.user(), Some("alice"));
        assert_eq!(tokens.session_id(), Some("abc123"));
        assert!(tokens.contains("user"));
        assert!(!tokens.contains("password"));
    }
}
