use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection string
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite:./data/bistro.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing session tokens. Protected routes answer with
    /// a server error while this is unset.
    #[serde(default)]
    pub token_secret: Option<String>,
    /// Session token lifetime in seconds
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl AuthConfig {
    /// The signing secret, if one is set and non-empty.
    pub fn secret(&self) -> Option<&str> {
        self.token_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "token_secret",
                &self.token_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

fn default_token_ttl_secs() -> u64 {
    60 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values taken from the process environment or command line, applied on
/// top of the file configuration.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub token_secret: Option<String>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(secret) = overrides.token_secret {
            self.auth.token_secret = Some(secret);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        self
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.token_ttl_secs, 3600);
        assert!(config.auth.secret().is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
            [server]
            port = 8088

            [auth]
            token_secret = "s3cret"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.secret(), Some("s3cret"));
        assert_eq!(config.auth.token_ttl_secs, 3600);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_blank_secret_counts_as_unset() {
        let config = Config::default().apply(Overrides {
            token_secret: Some("   ".to_string()),
            ..Default::default()
        });
        assert!(config.auth.secret().is_none());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let config = Config::parse("[server]\nport = 8088\n")
            .unwrap()
            .apply(Overrides {
                port: Some(9000),
                database_url: Some("sqlite::memory:".to_string()),
                token_secret: Some("env-secret".to_string()),
                log_level: Some("debug".to_string()),
            });

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.auth.secret(), Some("env-secret"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.listen_address(), "0.0.0.0:9000");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::default().apply(Overrides {
            token_secret: Some("hunter2".to_string()),
            ..Default::default()
        });
        let printed = format!("{:?}", config.auth);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
