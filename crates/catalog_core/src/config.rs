//! Runtime configuration for the catalog core.
//!
//! # Responsibility
//! - Load settings from an optional TOML file layered under `CATALOG__*`
//!   environment variables.
//! - Normalize and validate values before they reach the pool or logger.
//!
//! # Invariants
//! - Every field has a default, so an empty environment yields a usable
//!   in-process configuration.
//! - Environment variables override file values.

use crate::db::{DbPool, DbResult, PoolOptions};
use crate::logging::{default_log_level, normalize_level};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

/// File consulted by [`CatalogConfig::load`], relative to the working dir.
pub const DEFAULT_CONFIG_FILE: &str = "config/catalog.toml";
/// `db_path` value that selects a private in-memory database.
pub const IN_MEMORY_DB_PATH: &str = ":memory:";

const ENV_PREFIX: &str = "CATALOG";
const ENV_SEPARATOR: &str = "__";
const MAX_POOL_SIZE: usize = 64;

#[derive(Debug)]
pub enum ConfigLoadError {
    /// File could not be parsed or a value has the wrong type.
    Source(config::ConfigError),
    /// Value parsed but is outside the accepted range.
    Invalid(String),
}

impl Display for ConfigLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source(err) => write!(f, "failed to load catalog configuration: {err}"),
            Self::Invalid(message) => write!(f, "invalid catalog configuration: {message}"),
        }
    }
}

impl Error for ConfigLoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<config::ConfigError> for ConfigLoadError {
    fn from(value: config::ConfigError) -> Self {
        Self::Source(value)
    }
}

/// Catalog settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_checkout_timeout_ms")]
    pub checkout_timeout_ms: u64,
    #[serde(default = "default_level")]
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_db_path() -> String {
    "catalog.sqlite3".to_string()
}

fn default_pool_size() -> usize {
    4
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_checkout_timeout_ms() -> u64 {
    30_000
}

fn default_level() -> String {
    default_log_level().to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
            checkout_timeout_ms: default_checkout_timeout_ms(),
            log_level: default_level(),
            log_dir: None,
        }
    }
}

impl CatalogConfig {
    /// Loads `config/catalog.toml` (optional) overlaid with `CATALOG__*` env.
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Loads an explicit file (optional) overlaid with `CATALOG__*` env.
    pub fn load_from(path: &Path) -> Result<Self, ConfigLoadError> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()?;

        let mut loaded: CatalogConfig = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Trims and range-checks every field in place.
    pub fn validate(&mut self) -> Result<(), ConfigLoadError> {
        self.db_path = self.db_path.trim().to_string();
        if self.db_path.is_empty() {
            return Err(ConfigLoadError::Invalid("db_path cannot be empty".to_string()));
        }
        if self.pool_size == 0 || self.pool_size > MAX_POOL_SIZE {
            return Err(ConfigLoadError::Invalid(format!(
                "pool_size must be in 1..={MAX_POOL_SIZE}, got {}",
                self.pool_size
            )));
        }
        if self.checkout_timeout_ms == 0 {
            return Err(ConfigLoadError::Invalid(
                "checkout_timeout_ms must be positive".to_string(),
            ));
        }

        self.log_level = normalize_level(&self.log_level)
            .map_err(|err| ConfigLoadError::Invalid(err.to_string()))?
            .to_string();
        self.log_dir = self
            .log_dir
            .take()
            .map(|dir| dir.trim().to_string())
            .filter(|dir| !dir.is_empty());
        if let Some(dir) = &self.log_dir {
            if !Path::new(dir).is_absolute() {
                return Err(ConfigLoadError::Invalid(format!(
                    "log_dir must be an absolute path, got `{dir}`"
                )));
            }
        }
        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path == IN_MEMORY_DB_PATH
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            size: self.pool_size,
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            checkout_timeout: Duration::from_millis(self.checkout_timeout_ms),
        }
    }

    /// Opens the configured database; `:memory:` yields a one-connection pool.
    pub fn open_pool(&self) -> DbResult<DbPool> {
        if self.is_in_memory() {
            return DbPool::open_in_memory();
        }
        DbPool::open(&self.db_path, &self.pool_options())
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogConfig, ConfigLoadError, IN_MEMORY_DB_PATH};
    use std::time::Duration;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CatalogConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.pool_size, 4);
        assert_eq!(loaded.checkout_timeout_ms, 30_000);
        assert!(loaded.log_dir.is_none());
    }

    #[test]
    fn file_values_are_read_and_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(
            &path,
            "db_path = \"  :memory:  \"\npool_size = 2\nbusy_timeout_ms = 250\nlog_level = \"WARNING\"\nlog_dir = \"  \"\n",
        )
        .unwrap();

        let loaded = CatalogConfig::load_from(&path).unwrap();
        assert_eq!(loaded.db_path, IN_MEMORY_DB_PATH);
        assert!(loaded.is_in_memory());
        assert_eq!(loaded.log_level, "warn");
        assert_eq!(loaded.log_dir, None);
        assert_eq!(loaded.pool_options().size, 2);
        assert_eq!(
            loaded.pool_options().busy_timeout,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut zero_pool = CatalogConfig {
            pool_size: 0,
            ..CatalogConfig::default()
        };
        assert!(matches!(
            zero_pool.validate(),
            Err(ConfigLoadError::Invalid(_))
        ));

        let mut relative_logs = CatalogConfig {
            log_dir: Some("logs".to_string()),
            ..CatalogConfig::default()
        };
        assert!(matches!(
            relative_logs.validate(),
            Err(ConfigLoadError::Invalid(_))
        ));

        let mut bad_level = CatalogConfig {
            log_level: "loud".to_string(),
            ..CatalogConfig::default()
        };
        assert!(bad_level.validate().is_err());
    }

    #[test]
    fn in_memory_config_opens_single_connection_pool() {
        let config = CatalogConfig {
            db_path: IN_MEMORY_DB_PATH.to_string(),
            ..CatalogConfig::default()
        };
        let pool = config.open_pool().unwrap();
        assert_eq!(pool.size(), 1);
    }
}
