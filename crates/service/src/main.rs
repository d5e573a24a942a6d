use std::process::ExitCode;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use namelog_service::background;
use namelog_service::config::StorageConfig;
use namelog_service::error::{ServiceError, ServiceResult};
use namelog_service::migration::MigrationService;
use namelog_service::naming_log::GeneratedNamesService;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "namelog_service=debug,namelog_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ServiceResult<()> {
    // --- Configuration ---
    let config = StorageConfig::from_env()?;
    tracing::info!(
        use_database = config.use_database,
        enable_migration = config.enable_migration,
        legacy_file = %config.legacy_file_path().display(),
        "Loaded storage configuration"
    );

    // --- Database ---
    let Some(database_url) = config.database_url.as_deref() else {
        let service = GeneratedNamesService::from_config(&config, None);
        tracing::warn!(
            storage = ?service.storage_kind(),
            "DATABASE_URL not set; relational storage and migration are unavailable"
        );
        return Ok(());
    };

    let pool = namelog_db::create_pool(database_url, config.db_max_connections).await?;
    tracing::info!("Database connection pool created");

    namelog_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");

    // --- Schema and legacy migration ---
    let migration = MigrationService::from_config(pool.clone(), &config);
    if !migration.validate_database_schema().await {
        return Err(ServiceError::SchemaInvalid);
    }

    tracing::info!("Running legacy data migration if needed");
    if !migration.migrate_from_json_if_needed().await {
        tracing::warn!("Legacy data migration failed, but startup will continue");
    }

    let status = migration.get_migration_status().await;
    tracing::info!(
        database_connected = status.database_connected,
        database_records = status.database_record_count,
        legacy_records = status.json_record_count,
        migration_needed = status.json_migration_needed,
        last_migration = ?status.last_migration_date,
        "Migration status"
    );

    let service = GeneratedNamesService::from_config(&config, Some(pool.clone()));
    tracing::info!(storage = ?service.storage_kind(), "Generated name log ready");

    // --- Retention ---
    let cancel = CancellationToken::new();
    let retention_handle = config.retention_days.map(|days| {
        tokio::spawn(background::retention::run(pool.clone(), days, cancel.clone()))
    });

    shutdown_signal().await;

    // --- Shutdown ---
    cancel.cancel();
    if let Some(handle) = retention_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        tracing::info!("Retention job stopped");
    }
    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
