use namelog_core::error::CoreError;

use crate::config::ConfigError;

/// Service-level error type.
///
/// Wraps [`CoreError`] for domain errors and the storage, file and
/// serialization errors the services run into.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A domain-level error from `namelog_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Schema migration error: {0}")]
    Schema(#[from] sqlx::migrate::MigrateError),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database schema validation failed")]
    SchemaInvalid,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Migration already in progress")]
    AlreadyRunning,
}

/// Convenience type alias for service return values.
pub type ServiceResult<T> = Result<T, ServiceError>;
