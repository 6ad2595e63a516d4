//! Virzufurn Configuration Management
//!
//! Configuration is built once at process start (from a TOML file, the
//! environment, or both) and handed to the components that need it. Nothing
//! below the binary entry point reads environment variables directly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "VIRZUFURN_CONFIG";

const DEV_ACCESS_SECRET: &str = "development-access-secret-change-in-production";
const DEV_REFRESH_SECRET: &str = "development-refresh-secret-change-in-production";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database connection
    pub database: DatabaseConfig,

    /// Token and password settings
    pub auth: AuthConfig,

    /// Asset upload settings
    pub assets: AssetConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration: the TOML file named by `VIRZUFURN_CONFIG` if set,
    /// with environment variables taking precedence.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?.with_env_override()?,
            Err(_) => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_override()
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|message| ConfigError::ParseError { path, message })
    }

    /// Parse TOML content
    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_value("PORT", port)?;
        }
        if let Some(env) = lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
            self.server.environment = env.parse()?;
        }
        // CORS origins (comma-separated)
        if let Some(origins) = lookup("CORS_ORIGIN") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Database
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(max) = lookup("DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_value("DB_MAX_CONNECTIONS", max)?;
        }

        // Auth
        if let Some(secret) = lookup("ACCESS_TOKEN_SECRET") {
            self.auth.access_token_secret = secret;
        }
        if let Some(secs) = lookup("ACCESS_TOKEN_EXPIRY_SECS") {
            self.auth.access_token_expiry_secs = parse_value("ACCESS_TOKEN_EXPIRY_SECS", secs)?;
        }
        if let Some(secret) = lookup("REFRESH_TOKEN_SECRET") {
            self.auth.refresh_token_secret = secret;
        }
        if let Some(secs) = lookup("REFRESH_TOKEN_EXPIRY_SECS") {
            self.auth.refresh_token_expiry_secs = parse_value("REFRESH_TOKEN_EXPIRY_SECS", secs)?;
        }
        if let Some(issuer) = lookup("JWT_ISSUER") {
            self.auth.issuer = issuer;
        }

        // Assets
        if let Some(name) = lookup("CLOUDINARY_CLOUD_NAME") {
            self.assets.cloud_name = Some(name);
        }
        if let Some(key) = lookup("CLOUDINARY_API_KEY") {
            self.assets.api_key = Some(key);
        }
        if let Some(secret) = lookup("CLOUDINARY_API_SECRET") {
            self.assets.api_secret = Some(secret);
        }
        if let Some(dir) = lookup("UPLOAD_TEMP_DIR") {
            self.assets.temp_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("ASSET_PUBLIC_DIR") {
            self.assets.public_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("ASSET_BASE_URL") {
            self.assets.base_url = url;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(self)
    }

    /// Reject configurations that would weaken token security
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.access_token_secret.is_empty() {
            return Err(ConfigError::MissingRequired("ACCESS_TOKEN_SECRET".to_string()));
        }
        if self.auth.refresh_token_secret.is_empty() {
            return Err(ConfigError::MissingRequired("REFRESH_TOKEN_SECRET".to_string()));
        }
        if self.auth.access_token_secret == self.auth.refresh_token_secret {
            return Err(ConfigError::InvalidValue {
                key: "REFRESH_TOKEN_SECRET".to_string(),
                value: "must differ from ACCESS_TOKEN_SECRET".to_string(),
            });
        }
        if self.auth.access_token_expiry_secs == 0
            || self.auth.refresh_token_expiry_secs <= self.auth.access_token_expiry_secs
        {
            return Err(ConfigError::InvalidValue {
                key: "REFRESH_TOKEN_EXPIRY_SECS".to_string(),
                value: "refresh tokens must outlive access tokens".to_string(),
            });
        }

        if self.server.environment.is_production() {
            if self.auth.access_token_secret == DEV_ACCESS_SECRET {
                return Err(ConfigError::MissingRequired("ACCESS_TOKEN_SECRET".to_string()));
            }
            if self.auth.refresh_token_secret == DEV_REFRESH_SECRET {
                return Err(ConfigError::MissingRequired("REFRESH_TOKEN_SECRET".to_string()));
            }
        }

        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::InvalidValue {
                key: "APP_ENV".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Deployment environment; controls the cookie `Secure` flag and HSTS
    pub environment: Environment,

    /// Maximum request body size in bytes (multipart uploads included)
    pub max_body_size: usize,

    /// Allowed origins for CORS (credentials are allowed for these)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: Environment::Development,
            max_body_size: 10 * 1024 * 1024, // 10MB
            cors_origins: vec![],
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; the in-memory store is used when unset
    pub url: Option<String>,

    /// Connection pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

/// Token and password hashing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for access tokens
    pub access_token_secret: String,

    /// Access token lifetime in seconds
    pub access_token_expiry_secs: u64,

    /// HMAC secret for refresh tokens (must differ from the access secret)
    pub refresh_token_secret: String,

    /// Refresh token lifetime in seconds
    pub refresh_token_expiry_secs: u64,

    /// `iss` claim written to and required from every token
    pub issuer: String,

    /// Argon2 memory cost in KiB
    pub password_memory_kib: u32,

    /// Argon2 iterations
    pub password_time_cost: u32,

    /// Argon2 lanes
    pub password_parallelism: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: DEV_ACCESS_SECRET.to_string(),
            access_token_expiry_secs: 24 * 60 * 60, // 1 day
            refresh_token_secret: DEV_REFRESH_SECRET.to_string(),
            refresh_token_expiry_secs: 10 * 24 * 60 * 60, // 10 days
            issuer: "virzufurn-api".to_string(),
            password_memory_kib: 65536, // 64 MB
            password_time_cost: 3,
            password_parallelism: 4,
        }
    }
}

/// Asset upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Cloudinary cloud name
    pub cloud_name: Option<String>,

    /// Cloudinary API key
    pub api_key: Option<String>,

    /// Cloudinary API secret
    #[serde(skip_serializing)]
    pub api_secret: Option<String>,

    /// Where incoming multipart files are staged before upload
    pub temp_dir: PathBuf,

    /// Target directory for the local uploader
    pub public_dir: PathBuf,

    /// URL prefix the local uploader hands out
    pub base_url: String,

    /// Upload request timeout in seconds
    pub upload_timeout_secs: u64,
}

impl AssetConfig {
    /// `(cloud_name, api_key, api_secret)` when all three are configured
    pub fn cloudinary_credentials(&self) -> Option<(&str, &str, &str)> {
        match (&self.cloud_name, &self.api_key, &self.api_secret) {
            (Some(name), Some(key), Some(secret)) => Some((name, key, secret)),
            _ => None,
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            cloud_name: None,
            api_key: None,
            api_secret: None,
            temp_dir: PathBuf::from("./public/temp"),
            public_dir: PathBuf::from("./public/uploads"),
            base_url: "http://localhost:8000/uploads".to_string(),
            upload_timeout_secs: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.environment, Environment::Development);
        assert!(config.database.url.is_none());
        assert_ne!(
            config.auth.access_token_secret,
            config.auth.refresh_token_secret
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_applied() {
        let config = AppConfig::default()
            .with_overrides(lookup_from(&[
                ("PORT", "9001"),
                ("NODE_ENV", "production"),
                ("CORS_ORIGIN", "http://a.test, http://b.test"),
                ("ACCESS_TOKEN_SECRET", "a-secret"),
                ("REFRESH_TOKEN_SECRET", "r-secret"),
                ("ACCESS_TOKEN_EXPIRY_SECS", "60"),
                ("CLOUDINARY_CLOUD_NAME", "demo"),
                ("CLOUDINARY_API_KEY", "key"),
                ("CLOUDINARY_API_SECRET", "shh"),
                ("LOG_FORMAT", "JSON"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9001);
        assert!(config.server.environment.is_production());
        assert_eq!(config.server.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.auth.access_token_expiry_secs, 60);
        assert_eq!(
            config.assets.cloudinary_credentials(),
            Some(("demo", "key", "shh"))
        );
        assert!(config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_number_rejected() {
        let result = AppConfig::default().with_overrides(lookup_from(&[("PORT", "eighty")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "PORT"
        ));
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Development".parse::<Environment>().unwrap(), Environment::Development);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_validate_rejects_shared_secret() {
        let mut config = AppConfig::default();
        config.auth.refresh_token_secret = config.auth.access_token_secret.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_dev_secrets_in_production() {
        let mut config = AppConfig::default();
        config.server.environment = Environment::Production;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_from_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            [server]
            port = 3000

            [auth]
            access_token_expiry_secs = 900
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.access_token_expiry_secs, 900);
        // Unspecified fields keep their defaults
        assert_eq!(config.auth.refresh_token_expiry_secs, 864000);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_from_file_missing() {
        let result = AppConfig::from_file("/nonexistent/virzufurn.toml");
        assert!(matches!(result, Err(ConfigError::FileReadError { .. })));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("virzufurn.toml");
        std::fs::write(&path, "[database]\nurl = \"postgres://localhost/test\"\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://localhost/test")
        );
    }
}
