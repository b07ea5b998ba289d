use anyhow::{bail, Context, Result};
use serde::Deserialize;
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
    /// Origins allowed to call the API with credentials (the web client)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7777
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection string, e.g. `sqlite://data/partdesk.db`
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret for session tokens
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: u32,
    /// Mark the session cookie `Secure` (HTTPS deployments)
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_days: default_token_ttl_days(),
            secure_cookie: false,
        }
    }
}

fn default_token_ttl_days() -> u32 {
    7
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

    /// The storage connection string and the signing secret have no
    /// defaults; the process must not start without them.
    pub fn validate(&self) -> Result<()> {
        match self.database.url.as_deref() {
            Some(url) if !url.trim().is_empty() => {}
            _ => bail!("Database url is not configured (set database.url or DATABASE_URL)"),
        }
        match self.auth.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => {}
            _ => bail!("JWT secret is not configured (set auth.jwt_secret or JWT_SECRET)"),
        }
        if self.auth.token_ttl_days == 0 {
            bail!("auth.token_ttl_days must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 7777);
        assert_eq!(config.server.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.auth.token_ttl_days, 7);
        assert!(!config.auth.secure_cookie);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_sections() {
        let config = Config::parse(
            r#"
            [server]
            port = 9000
            cors_origins = ["https://parts.example.com"]

            [database]
            url = "sqlite://data/partdesk.db"

            [auth]
            jwt_secret = "change-me"
            secure_cookie = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.url.as_deref(), Some("sqlite://data/partdesk.db"));
        assert!(config.auth.secure_cookie);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_url_and_secret() {
        let mut config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Database url"));

        config.database.url = Some("sqlite::memory:".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("JWT secret"));

        config.auth.jwt_secret = Some("s".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/partdesk.toml")).unwrap();
        assert!(config.database.url.is_none());
    }
}
