//! One-shot migration of the legacy flat file into the relational store.
//!
//! A run reads the legacy file, optionally writes a verbatim backup, then
//! imports every record inside a single transaction:
//!
//! - malformed or invalid records are recorded as per-record errors and
//!   skipped without touching the transaction;
//! - records already visible in the store (same resource name, user and
//!   creation time) are skipped, which makes re-runs safe;
//! - staged inserts are flushed every [`MIGRATION_FLUSH_BATCH`] records;
//! - any storage error, or cancellation, rolls the whole run back.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use namelog_core::error::CoreError;
use namelog_core::generated_name::{
    is_empty_source, parse_legacy_array, resource_name_hint, GeneratedName,
};
use namelog_core::migration::{MigrationResult, MigrationStatus, MIGRATION_FLUSH_BATCH};
use namelog_core::naming::MIGRATION_CREATED_BY;
use namelog_core::types::Timestamp;
use namelog_db::models::generated_name::CreateGeneratedName;
use namelog_db::repositories::GeneratedNameRepo;
use sqlx::{PgConnection, PgPool};
use tokio_util::sync::CancellationToken;

use crate::config::StorageConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::legacy_store::LegacyNameStore;

/// Moves legacy flat-file records into the relational store.
///
/// Share one instance (behind an `Arc`) per process: it carries the
/// in-progress flag that rejects overlapping runs.
pub struct MigrationService {
    pool: PgPool,
    legacy: LegacyNameStore,
    migration_enabled: bool,
    running: AtomicBool,
}

/// Per-run counters, copied into the [`MigrationResult`] only after commit.
#[derive(Debug, Default)]
struct ImportTally {
    migrated: usize,
    skipped: usize,
    errors: Vec<String>,
}

/// Dedupe key: resource name, user, creation time.
type ImportKey = (String, String, Timestamp);

impl MigrationService {
    pub fn new(pool: PgPool, legacy: LegacyNameStore, migration_enabled: bool) -> Self {
        Self {
            pool,
            legacy,
            migration_enabled,
            running: AtomicBool::new(false),
        }
    }

    pub fn from_config(pool: PgPool, config: &StorageConfig) -> Self {
        Self::new(pool, LegacyNameStore::from_config(config), config.enable_migration)
    }

    /// Run the migration with backup if it is enabled and needed.
    ///
    /// Returns `true` when there was nothing to do or the run succeeded.
    /// Never fails: problems are logged and reported as `false`.
    pub async fn migrate_from_json_if_needed(&self) -> bool {
        if !self.migration_enabled {
            tracing::info!("Legacy migration is disabled in configuration");
            return true;
        }
        if !self.is_json_migration_needed().await {
            tracing::info!("Legacy migration is not needed");
            return true;
        }

        let result = self.migrate_from_json(true).await;
        if result.success {
            tracing::info!(message = %result.message, "Automatic legacy migration completed");
            true
        } else {
            tracing::warn!(message = %result.message, "Automatic legacy migration failed");
            false
        }
    }

    /// Run the full migration regardless of need.
    pub async fn migrate_from_json(&self, backup_original: bool) -> MigrationResult {
        self.migrate_from_json_with_cancel(backup_original, &CancellationToken::new())
            .await
    }

    /// Run the full migration, aborting and rolling back if `cancel` fires.
    ///
    /// The token is checked before each record and before commit.
    pub async fn migrate_from_json_with_cancel(
        &self,
        backup_original: bool,
        cancel: &CancellationToken,
    ) -> MigrationResult {
        let timer = Instant::now();
        let mut result = MigrationResult::started();

        if !self.migration_enabled {
            result.message = "Migration is disabled in configuration".to_string();
        } else if let Some(_guard) = RunGuard::acquire(&self.running) {
            match self.run(backup_original, cancel, &mut result).await {
                Ok(()) => tracing::info!(
                    migrated = result.migrated_count,
                    skipped = result.skipped_count,
                    errors = result.error_count,
                    total = result.total_count,
                    success_rate = result.success_rate(),
                    "Legacy migration completed"
                ),
                Err(e) => {
                    tracing::error!(error = %e, "Legacy migration failed");
                    result.fail(e);
                }
            }
        } else {
            tracing::warn!("Legacy migration requested while another run is in progress");
            result.fail(ServiceError::AlreadyRunning);
        }

        result.finish(timer.elapsed());
        result
    }

    /// `false` if the relational store holds any visible record or the legacy
    /// file has no records; `true` otherwise. Errors are logged and reported
    /// as `false`.
    pub async fn is_json_migration_needed(&self) -> bool {
        match self.check_migration_needed().await {
            Ok(needed) => needed,
            Err(e) => {
                tracing::error!(error = %e, "Failed to check whether legacy migration is needed");
                false
            }
        }
    }

    /// Apply the schema if it is missing and confirm the table can be read.
    /// This is the only place schema migrations are run at startup.
    pub async fn validate_database_schema(&self) -> bool {
        let outcome = async {
            namelog_db::run_migrations(&self.pool).await?;
            GeneratedNameRepo::count_all_rows(&self.pool).await?;
            Ok::<_, ServiceError>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                tracing::info!("Database schema validation successful");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Database schema validation failed");
                false
            }
        }
    }

    /// Snapshot of connectivity, record counts and migration state.
    pub async fn get_migration_status(&self) -> MigrationStatus {
        let mut status = MigrationStatus {
            migration_enabled: self.migration_enabled,
            ..Default::default()
        };

        status.database_connected = namelog_db::health_check(&self.pool).await.is_ok();
        if status.database_connected {
            match GeneratedNameRepo::get_count(&self.pool).await {
                Ok(count) => status.database_record_count = count,
                Err(e) => status.error_message = Some(e.to_string()),
            }
        }

        match self.legacy.count().await {
            Ok(count) => status.json_record_count = count,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read legacy file for migration status");
                status.error_message = Some(format!("Failed to read legacy file: {e}"));
            }
        }

        status.json_migration_needed = self.is_json_migration_needed().await;

        if status.database_record_count > 0 {
            let earliest =
                GeneratedNameRepo::earliest_created_at_by_creator(&self.pool, MIGRATION_CREATED_BY)
                    .await;
            match earliest {
                Ok(date) => status.last_migration_date = date,
                Err(e) => status.error_message = Some(e.to_string()),
            }
        }

        status
    }

    // ── Run internals ────────────────────────────────────────────────

    async fn check_migration_needed(&self) -> ServiceResult<bool> {
        let db_count = GeneratedNameRepo::get_count(&self.pool).await?;
        if db_count > 0 {
            tracing::debug!(db_count, "Database already populated, legacy migration not needed");
            return Ok(false);
        }
        let json_count = self.legacy.count().await?;
        tracing::debug!(json_count, db_count, "Checked legacy migration need");
        Ok(json_count > 0)
    }

    async fn run(
        &self,
        backup_original: bool,
        cancel: &CancellationToken,
        result: &mut MigrationResult,
    ) -> ServiceResult<()> {
        let raw = match self.legacy.read_raw().await? {
            Some(raw) if !is_empty_source(&raw) => raw,
            _ => {
                result.success = true;
                result.message = "No data to migrate - legacy file is empty".to_string();
                return Ok(());
            }
        };
        let entries = parse_legacy_array(&raw)?;
        if entries.is_empty() {
            result.success = true;
            result.message = "No valid data found in legacy file".to_string();
            return Ok(());
        }
        result.total_count = entries.len();

        if backup_original {
            let backup = self.legacy.backup(&raw).await?;
            result.backup_file_path = Some(backup.display().to_string());
        }

        let mut tx = self.pool.begin().await?;
        let outcome = match import_entries(&mut *tx, entries, cancel).await {
            Ok(_) if cancel.is_cancelled() => Err(ServiceError::Cancelled),
            other => other,
        };
        let tally = match outcome {
            Ok(tally) => tally,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback after failed migration failed");
                }
                return Err(e);
            }
        };
        tx.commit().await?;

        result.migrated_count = tally.migrated;
        result.skipped_count = tally.skipped;
        for error in tally.errors {
            result.push_record_error(error);
        }
        result.success = true;
        result.message = result.summary();
        Ok(())
    }
}

/// Import every entry on `conn`. Returns early on cancellation or on the
/// first storage error; the caller rolls back in both cases.
async fn import_entries(
    conn: &mut PgConnection,
    entries: Vec<serde_json::Value>,
    cancel: &CancellationToken,
) -> ServiceResult<ImportTally> {
    let mut tally = ImportTally::default();
    let mut staged: Vec<CreateGeneratedName> = Vec::with_capacity(MIGRATION_FLUSH_BATCH);
    let mut staged_keys: HashSet<ImportKey> = HashSet::new();

    for (index, entry) in entries.into_iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }

        let hint = resource_name_hint(&entry);
        let input = match transform_legacy_entry(entry) {
            Ok(input) => input,
            Err(e) => {
                tracing::warn!(index, resource_name = %hint, error = %e, "Skipping legacy record");
                tally
                    .errors
                    .push(format!("Failed to migrate record {index} for resource '{hint}': {e}"));
                continue;
            }
        };

        let key = import_key(&input);
        let duplicate = staged_keys.contains(&key)
            || GeneratedNameRepo::import_duplicate_exists(conn, &key.0, &key.1, key.2).await?;
        if duplicate {
            tracing::debug!(
                resource_name = %input.resource_name,
                "Skipping duplicate legacy record"
            );
            tally.skipped += 1;
            continue;
        }

        staged_keys.insert(key);
        staged.push(input);

        if staged.len() >= MIGRATION_FLUSH_BATCH {
            tally.migrated += flush(conn, &mut staged).await?;
            staged_keys.clear();
            tracing::debug!(migrated = tally.migrated, "Flushed legacy migration batch");
        }
    }

    tally.migrated += flush(conn, &mut staged).await?;
    Ok(tally)
}

/// Insert and clear every staged record. Returns how many were inserted.
async fn flush(
    conn: &mut PgConnection,
    staged: &mut Vec<CreateGeneratedName>,
) -> Result<usize, sqlx::Error> {
    let count = staged.len();
    for input in staged.drain(..) {
        GeneratedNameRepo::insert_with_components(conn, &input).await?;
    }
    Ok(count)
}

/// Decode and validate one legacy element into an insert tagged as migrated.
pub fn transform_legacy_entry(entry: serde_json::Value) -> Result<CreateGeneratedName, CoreError> {
    let name = GeneratedName::from_legacy_value(entry)?;
    name.validate()?;

    let mut input = CreateGeneratedName::from_generated_name(&name);
    input.created_by = Some(MIGRATION_CREATED_BY.to_string());
    Ok(input)
}

fn import_key(input: &CreateGeneratedName) -> ImportKey {
    (
        input.resource_name.clone(),
        input.user_name.clone().unwrap_or_default(),
        input.created_at.unwrap_or_default(),
    )
}

/// Clears the in-progress flag when dropped.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
