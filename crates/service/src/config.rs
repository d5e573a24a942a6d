use std::path::PathBuf;

use namelog_db::DEFAULT_MAX_CONNECTIONS;

/// Default directory holding the legacy file and its backups.
pub const DEFAULT_DATA_DIR: &str = "./settings";

/// Default legacy flat-file name.
pub const DEFAULT_LEGACY_FILE: &str = "generatednames.json";

/// Longest accepted retention period (100 years).
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Configuration errors raised while reading the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a boolean (true/false/1/0/yes/no), got '{value}'")]
    InvalidBool { name: &'static str, value: String },

    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be at most {max}, got '{value}'")]
    OutOfRange {
        name: &'static str,
        value: String,
        max: i64,
    },
}

/// Storage configuration, read once at startup and never hot-reloaded.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Postgres URL. Without it the relational store is unavailable and
    /// writes fall back to the legacy file.
    pub database_url: Option<String>,
    /// Route new writes to the relational store (default: `true`).
    pub use_database: bool,
    /// Allow the automatic legacy migration (default: `true`).
    pub enable_migration: bool,
    pub data_dir: PathBuf,
    pub legacy_file_name: String,
    pub db_max_connections: u32,
    /// When set, records older than this many days are purged hourly.
    /// At most [`MAX_RETENTION_DAYS`].
    pub retention_days: Option<i64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            use_database: true,
            enable_migration: true,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            legacy_file_name: DEFAULT_LEGACY_FILE.to_string(),
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            retention_days: None,
        }
    }
}

impl StorageConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default               |
    /// |------------------------------|-----------------------|
    /// | `DATABASE_URL`               | unset                 |
    /// | `NAMELOG_USE_DATABASE`       | `true`                |
    /// | `NAMELOG_ENABLE_MIGRATION`   | `true`                |
    /// | `NAMELOG_DATA_DIR`           | `./settings`          |
    /// | `NAMELOG_LEGACY_FILE`        | `generatednames.json` |
    /// | `NAMELOG_DB_MAX_CONNECTIONS` | `20`                  |
    /// | `NAMELOG_RETENTION_DAYS`     | unset (max `36500`)   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let use_database = match var("NAMELOG_USE_DATABASE") {
            Some(raw) => parse_bool("NAMELOG_USE_DATABASE", &raw)?,
            None => defaults.use_database,
        };
        let enable_migration = match var("NAMELOG_ENABLE_MIGRATION") {
            Some(raw) => parse_bool("NAMELOG_ENABLE_MIGRATION", &raw)?,
            None => defaults.enable_migration,
        };
        let db_max_connections = match var("NAMELOG_DB_MAX_CONNECTIONS") {
            Some(raw) => parse_positive("NAMELOG_DB_MAX_CONNECTIONS", &raw)?,
            None => defaults.db_max_connections,
        };
        let retention_days = var("NAMELOG_RETENTION_DAYS")
            .map(|raw| parse_retention_days(&raw))
            .transpose()?;

        Ok(Self {
            database_url: var("DATABASE_URL"),
            use_database,
            enable_migration,
            data_dir: var("NAMELOG_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            legacy_file_name: var("NAMELOG_LEGACY_FILE").unwrap_or(defaults.legacy_file_name),
            db_max_connections,
            retention_days,
        })
    }

    /// Full path of the legacy flat file.
    pub fn legacy_file_path(&self) -> PathBuf {
        self.data_dir.join(&self.legacy_file_name)
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name,
            value: raw.to_string(),
        }),
    }
}

fn parse_positive<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match raw.parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::InvalidNumber {
            name,
            value: raw.to_string(),
        }),
    }
}

fn parse_retention_days(raw: &str) -> Result<i64, ConfigError> {
    let days = parse_positive::<i64>("NAMELOG_RETENTION_DAYS", raw)?;
    if days > MAX_RETENTION_DAYS {
        return Err(ConfigError::OutOfRange {
            name: "NAMELOG_RETENTION_DAYS",
            value: raw.to_string(),
            max: MAX_RETENTION_DAYS,
        });
    }
    Ok(days)
}
