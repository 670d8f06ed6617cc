use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable holding the token signing key.
pub const ENV_SECRET_KEY: &str = "secret_key";
/// Environment variable holding the database file name.
pub const ENV_DB_NAME: &str = "dbname";
/// Environment variable holding a full database URL.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Upper bound for `auth.token_ttl_seconds` (one year)
pub const MAX_TOKEN_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
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
    /// SQLite connection URL
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
    database_url_for("storefront")
}

fn database_url_for(name: &str) -> String {
    format!("sqlite:./data/{}.db?mode=rwc", name)
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseConfig {
    /// True for `sqlite::memory:` style URLs, which vanish with their last connection.
    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC key used to sign session tokens; generated at load time if empty
    #[serde(default)]
    pub secret_key: String,
    /// Session token lifetime in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
    /// Mark the token cookie `Secure`
    #[serde(default = "default_true")]
    pub secure_cookies: bool,
    /// Set when `secret_key` was generated for this process
    #[serde(skip)]
    pub key_generated: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            token_ttl_seconds: default_token_ttl(),
            secure_cookies: true,
            key_generated: false,
        }
    }
}

fn generate_secret_key() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

fn default_token_ttl() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_requests_per_day")]
    pub requests_per_day: u32,
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,
    /// Request paths that never count against a client's quota
    #[serde(default = "default_exempt_paths")]
    pub exempt_paths: Vec<String>,
    /// Seconds between sweeps of stale limiter entries
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_day: default_requests_per_day(),
            requests_per_hour: default_requests_per_hour(),
            exempt_paths: default_exempt_paths(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

fn default_requests_per_day() -> u32 {
    100
}

fn default_requests_per_hour() -> u32 {
    20
}

fn default_exempt_paths() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_cleanup_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; empty allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
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

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
            logging: LoggingConfig::default(),
            source: None,
        }
    }
}

impl Config {
    /// Load the config file (if present), then apply environment overrides.
    ///
    /// Runs before logging is set up; call [`Config::log_summary`] once the
    /// subscriber is installed.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.ensure_secret_key();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse configuration file")?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Generate a signing key if neither the file nor the environment set one.
    /// Returns true when a key was generated.
    pub fn ensure_secret_key(&mut self) -> bool {
        if !self.auth.secret_key.is_empty() {
            return false;
        }
        self.auth.secret_key = generate_secret_key();
        self.auth.key_generated = true;
        true
    }

    /// Log where the configuration came from and anything the operator must know.
    pub fn log_summary(&self) {
        match &self.source {
            Some(path) => info!("Loaded configuration from {}", path.display()),
            None => info!("No config file found, using defaults"),
        }
        if self.auth.key_generated {
            warn!(
                "{} is not set and auth.secret_key is empty; using a generated signing key, sessions will not survive a restart",
                ENV_SECRET_KEY
            );
        }
    }

    /// Apply overrides from the process environment.
    ///
    /// `lookup` is injected so tests do not have to mutate the real environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_SECRET_KEY).filter(|k| !k.is_empty()) {
            self.auth.secret_key = key;
        }

        if let Some(url) = lookup(ENV_DATABASE_URL).filter(|u| !u.is_empty()) {
            self.database.url = url;
        } else if let Some(name) = lookup(ENV_DB_NAME).filter(|n| !n.is_empty()) {
            self.database.url = database_url_for(&name);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.secret_key.is_empty() {
            bail!("auth.secret_key must not be empty");
        }
        if self.auth.token_ttl_seconds == 0 {
            bail!("auth.token_ttl_seconds must be greater than zero");
        }
        if self.auth.token_ttl_seconds > MAX_TOKEN_TTL_SECONDS {
            bail!(
                "auth.token_ttl_seconds must be at most {} (one year)",
                MAX_TOKEN_TTL_SECONDS
            );
        }
        if self.rate_limit.requests_per_day == 0 || self.rate_limit.requests_per_hour == 0 {
            bail!("rate_limit quotas must be greater than zero");
        }
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be greater than zero");
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.token_ttl_seconds, 3600);
        assert_eq!(config.rate_limit.requests_per_day, 100);
        assert_eq!(config.rate_limit.requests_per_hour, 20);
        assert_eq!(config.rate_limit.exempt_paths, vec!["/".to_string()]);
        assert!(config.auth.secret_key.is_empty());
        assert!(config.source.is_none());
    }

    #[test]
    fn test_missing_key_is_generated_and_flagged() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        assert!(config.ensure_secret_key());
        assert!(config.auth.key_generated);
        assert_eq!(config.auth.secret_key.len(), 64);
        assert!(config.validate().is_ok());

        // A second call keeps the existing key.
        let key = config.auth.secret_key.clone();
        assert!(!config.ensure_secret_key());
        assert_eq!(config.auth.secret_key, key);
    }

    #[test]
    fn test_configured_key_is_not_flagged() {
        let mut config = Config::default();
        config.apply_env(env(&[("secret_key", "s3cret")]));
        assert!(!config.ensure_secret_key());
        assert!(!config.auth.key_generated);
        assert_eq!(config.auth.secret_key, "s3cret");
    }

    #[test]
    fn test_from_file_records_source() {
        let path = std::env::temp_dir().join(format!("storefront-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[auth]\nsecret_key = \"from-file\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert_eq!(config.auth.secret_key, "from-file");

        let missing = Config::from_file(Path::new("/nonexistent/storefront.toml")).unwrap();
        assert!(missing.source.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8081

            [rate_limit]
            requests_per_hour = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.rate_limit.requests_per_hour, 5);
        assert_eq!(config.rate_limit.requests_per_day, 100);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[("secret_key", "s3cret"), ("dbname", "shop")]));

        assert_eq!(config.auth.secret_key, "s3cret");
        assert_eq!(config.database.url, "sqlite:./data/shop.db?mode=rwc");
    }

    #[test]
    fn test_database_url_wins_over_dbname() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("dbname", "shop"),
            ("DATABASE_URL", "sqlite::memory:"),
        ]));

        assert_eq!(config.database.url, "sqlite::memory:");
        assert!(config.database.is_memory());
    }

    #[test]
    fn test_validate_rejects_zero_quota() {
        let mut config = Config::default();
        config.ensure_secret_key();
        config.rate_limit.requests_per_hour = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut config = Config::default();
        config.ensure_secret_key();
        config.auth.token_ttl_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_ttl() {
        let mut config = Config::default();
        config.ensure_secret_key();

        config.auth.token_ttl_seconds = MAX_TOKEN_TTL_SECONDS;
        assert!(config.validate().is_ok());

        config.auth.token_ttl_seconds = MAX_TOKEN_TTL_SECONDS + 1;
        assert!(config.validate().is_err());

        config.auth.token_ttl_seconds = u64::MAX;
        assert!(config.validate().is_err());
    }
}
