//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Moderation and ranking tunables.
    #[serde(default)]
    pub moderation: ModerationConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Moderation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationConfig {
    /// Pending listing count at which admins get a backlog notification.
    #[serde(default = "default_pending_backlog_threshold")]
    pub pending_backlog_threshold: u64,
    /// Length of the window attached by a super-admin "make special" approval.
    #[serde(default = "default_special_promotion_days")]
    pub special_promotion_days: i64,
    /// Page size used when the client does not ask for one.
    #[serde(default = "default_per_page")]
    pub default_per_page: u64,
    /// Upper bound on client supplied page sizes.
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            pending_backlog_threshold: default_pending_backlog_threshold(),
            special_promotion_days: default_special_promotion_days(),
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON formatted log lines instead of the human readable format.
    #[serde(default)]
    pub json: bool,
    /// Fallback filter directive when `RUST_LOG` is unset.
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_max_connections() -> u32 {
    50
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_pending_backlog_threshold() -> u64 {
    50
}

const fn default_special_promotion_days() -> i64 {
    30
}

const fn default_per_page() -> u64 {
    20
}

const fn default_max_per_page() -> u64 {
    100
}

impl ModerationConfig {
    /// Resolve a client supplied page size against the configured bounds.
    #[must_use]
    pub fn page_size(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_per_page)
            .clamp(1, self.max_per_page.max(1))
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `CLASSIFIEDS_ENV`)
    /// 3. Environment variables with `CLASSIFIEDS_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("CLASSIFIEDS_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CLASSIFIEDS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("CLASSIFIEDS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
