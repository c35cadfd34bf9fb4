//! Service configuration types for Trestle.
//!
//! `TrestleConfig` represents the `config.toml` that controls the bind
//! address, backend implementation, debug flags, and the demo
//! authentication realm. All fields have sensible defaults. The file
//! loader lives in `trestle-infra`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::debug::DebugFlags;

/// Top-level configuration for a Trestle service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrestleConfig {
    /// Bind address and backend selection.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Demo authentication realm and its users.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Where and how the service runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Hostname or address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Registered backend implementation name (e.g. "axum", "tower").
    #[serde(default = "default_impl", rename = "impl")]
    pub impl_name: String,

    /// How much exception detail responses reveal.
    #[serde(default)]
    pub debug_flags: DebugFlags,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_impl() -> String {
    "axum".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            impl_name: default_impl(),
            debug_flags: DebugFlags::default(),
        }
    }
}

impl ServiceConfig {
    /// The address string this service binds, in `host:port` form.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Users known to the in-memory authentication supplicant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Realm name presented in authentication challenges.
    #[serde(default = "default_realm")]
    pub realm: String,

    /// Username to password map for the demo realm.
    #[serde(default)]
    pub users: BTreeMap<String, String>,
}

fn default_realm() -> String {
    "trestle".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            realm: default_realm(),
            users: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::DEBUG_DEFAULT;

    #[test]
    fn test_config_default_values() {
        let config = TrestleConfig::default();
        assert_eq!(config.service.host, "127.0.0.1");
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.service.impl_name, "axum");
        assert_eq!(config.service.debug_flags, DEBUG_DEFAULT);
        assert_eq!(config.auth.realm, "trestle");
        assert!(config.auth.users.is_empty());
    }

    #[test]
    fn test_config_deserialize_empty_toml() {
        let config: TrestleConfig = toml::from_str("").unwrap();
        assert_eq!(config.service.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.service.impl_name, "axum");
    }

    #[test]
    fn test_config_deserialize_with_values() {
        let toml_str = r#"
[service]
host = "0.0.0.0"
port = 9090
impl = "tower"
debug_flags = 63

[auth]
realm = "sekrit"

[auth.users]
alice = "wonderland"
bob = "builder"
"#;
        let config: TrestleConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.service.host, "0.0.0.0");
        assert_eq!(config.service.port, 9090);
        assert_eq!(config.service.impl_name, "tower");
        assert_eq!(config.service.debug_flags.bits(), 63);
        assert_eq!(config.auth.realm, "sekrit");
        assert_eq!(config.auth.users.get("alice").map(String::as_str), Some("wonderland"));
        assert_eq!(config.auth.users.len(), 2);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let mut config = TrestleConfig::default();
        config.service.port = 3000;
        config.auth.users.insert("carol".to_string(), "pass".to_string());
        let json = serde_json::to_string(&config).unwrap();
        let parsed: TrestleConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.service.port, 3000);
        assert_eq!(parsed.auth.users.len(), 1);
    }
}
