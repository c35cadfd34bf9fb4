//! Configuration file loader for Trestle.
//!
//! Reads `config.toml` from an explicit path or from the platform config
//! directory (`~/.config/trestle/` on Linux) and deserializes it into
//! [`TrestleConfig`]. Falls back to the built-in defaults when the file
//! is missing or malformed, so a bare `trestle serve` always works.

use std::path::{Path, PathBuf};

use trestle_types::config::TrestleConfig;

/// Where the config file lives when no explicit path is given.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("trestle").join("config.toml"))
}

/// Load configuration from `path`, or from [`default_config_path`] when
/// `path` is `None`.
///
/// - If the file does not exist, returns [`TrestleConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns
///   the default.
/// - If the file exists and parses successfully, returns the parsed
///   config.
pub async fn load_config(path: Option<&Path>) -> TrestleConfig {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) => path,
            None => {
                tracing::debug!("No config directory on this platform, using defaults");
                return TrestleConfig::default();
            }
        },
    };

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No config.toml found at {}, using defaults",
                config_path.display()
            );
            return TrestleConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                "Failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return TrestleConfig::default();
        }
    };

    match toml::from_str::<TrestleConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            TrestleConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(Some(&tmp.path().join("config.toml"))).await;
        assert_eq!(config.service.host, "127.0.0.1");
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.service.impl_name, "axum");
    }

    #[tokio::test]
    async fn test_load_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(
            &config_path,
            r#"
[service]
host = "0.0.0.0"
port = 9090
impl = "tower"
debug_flags = 15

[auth]
realm = "demo"

[auth.users]
alice = "opensesame"
"#,
        )
        .await
        .unwrap();

        let config = load_config(Some(&config_path)).await;
        assert_eq!(config.service.host, "0.0.0.0");
        assert_eq!(config.service.port, 9090);
        assert_eq!(config.service.impl_name, "tower");
        assert_eq!(config.service.debug_flags.bits(), 15);
        assert_eq!(config.auth.realm, "demo");
        assert_eq!(
            config.auth.users.get("alice").map(String::as_str),
            Some("opensesame")
        );
    }

    #[tokio::test]
    async fn test_load_partial_toml_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(&config_path, "[service]\nport = 3000\n")
            .await
            .unwrap();

        let config = load_config(Some(&config_path)).await;
        assert_eq!(config.service.port, 3000);
        assert_eq!(config.service.host, "127.0.0.1");
        assert_eq!(config.auth.realm, "trestle");
    }

    #[tokio::test]
    async fn test_load_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        tokio::fs::write(&config_path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(Some(&config_path)).await;
        assert_eq!(config.service.port, 8080);
    }
}
