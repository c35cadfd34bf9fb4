//! In-memory credential and session backends.
//!
//! These supplicants verify against process-local state, which is all a
//! demo or a test needs. A real deployment would implement
//! [`Supplicant`] over its own user store and keep the connectors from
//! `basic` and `session` unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use trestle_core::auth::{
    RequestAuthInfo, SECPROV_CLIENT_AUTH, Supplicant, SupplicantError, TokenMap,
};

/// Verifies `user`/`password` tokens against an in-memory map.
pub struct InMemoryPlainSupplicant {
    realm: String,
    users: BTreeMap<String, SecretString>,
}

impl InMemoryPlainSupplicant {
    pub fn new(
        realm: impl Into<String>,
        users: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            realm: realm.into(),
            users: users
                .into_iter()
                .map(|(user, password)| (user, SecretString::from(password)))
                .collect(),
        }
    }

    fn creds_match(&self, user: &str, password: &str) -> bool {
        match self.users.get(user) {
            Some(actual) => actual.expose_secret() == password,
            None => false,
        }
    }
}

impl Supplicant for InMemoryPlainSupplicant {
    async fn verify(&self, tokens: &TokenMap) -> Result<RequestAuthInfo, SupplicantError> {
        let user = tokens.user().unwrap_or_default();
        let password = tokens.get("password").unwrap_or_default();

        let mut info = RequestAuthInfo::new();
        // Vouch for everything but the password.
        for (name, value) in tokens.iter() {
            if name != "password" {
                info.tokens.insert(name, value);
            }
        }
        info.realm = Some(self.realm.clone());
        info.provisions = SECPROV_CLIENT_AUTH;
        info.accepted = Some(self.creds_match(user, password));
        Ok(info)
    }
}

/// In-memory session store. Session ids are UUIDs; only SHA-256 digests
/// of ids are kept, so a leaked store cannot impersonate its sessions.
pub struct SessionManager {
    sessions: DashMap<[u8; 32], String>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    fn digest(session_id: &str) -> [u8; 32] {
        Sha256::digest(session_id.as_bytes()).into()
    }

    /// Open a session for a user and return its id.
    pub fn login(&self, user: &str) -> String {
        let session_id = Uuid::now_v7().to_string();
        self.sessions
            .insert(Self::digest(&session_id), user.to_string());
        session_id
    }

    /// The user a session was opened for, if the session is live.
    pub fn recall(&self, session_id: &str) -> Option<String> {
        self.sessions
            .get(&Self::digest(session_id))
            .map(|entry| entry.value().clone())
    }

    /// Close a session. Closing an unknown session is a no-op.
    pub fn logout(&self, session_id: &str) {
        self.sessions.remove(&Self::digest(session_id));
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Login supplicant: verifies credentials, then opens a session and adds
/// the `session_id` token for the clerk to hand out.
pub struct SessionStoreSupplicant {
    credentials: InMemoryPlainSupplicant,
    sessions: Arc<SessionManager>,
}

impl SessionStoreSupplicant {
    pub fn new(credentials: InMemoryPlainSupplicant, sessions: Arc<SessionManager>) -> Self {
        Self {
            credentials,
            sessions,
        }
    }
}

impl Supplicant for SessionStoreSupplicant {
    async fn verify(&self, tokens: &TokenMap) -> Result<RequestAuthInfo, SupplicantError> {
        let mut info = self.credentials.verify(tokens).await?;
        if info.accepted == Some(true) {
            let user = info.tokens.user().map(str::to_string);
            if let Some(user) = user {
                let session_id = self.sessions.login(&user);
                info.tokens.insert("session_id", session_id);
            }
        }
        Ok(info)
    }
}

/// Recall supplicant: resolves a `session_id` token back to its user.
pub struct SessionRecallSupplicant {
    realm: String,
    sessions: Arc<SessionManager>,
}

impl SessionRecallSupplicant {
    pub fn new(realm: impl Into<String>, sessions: Arc<SessionManager>) -> Self {
        Self {
            realm: realm.into(),
            sessions,
        }
    }
}

impl Supplicant for SessionRecallSupplicant {
    async fn verify(&self, tokens: &TokenMap) -> Result<RequestAuthInfo, SupplicantError> {
        let mut info = RequestAuthInfo::new();
        info.realm = Some(self.realm.clone());
        info.provisions = SECPROV_CLIENT_AUTH;
        match tokens.session_id() {
            Some(session_id) => match self.sessions.recall(session_id) {
                Some(user) => {
                    info.tokens.insert("session_id", session_id);
                    info.tokens.insert("user", user);
                    info.accepted = Some(true);
                }
                None => {
                    info.accepted = Some(false);
                }
            },
            None => {
                info.accepted = Some(false);
            }
        }
        Ok(info)
    }
}
