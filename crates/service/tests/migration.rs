//! Integration tests for the legacy flat-file migration.
//!
//! Each test gets a fresh database and a temporary directory holding the
//! legacy `generatednames.json`.

use chrono::{TimeZone, Utc};
use namelog_db::repositories::GeneratedNameRepo;
use namelog_service::legacy_store::LegacyNameStore;
use namelog_service::migration::MigrationService;
use serde_json::{json, Value};
use sqlx::PgPool;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn legacy_file(dir: &TempDir, records: Value) -> LegacyNameStore {
    let path = dir.path().join("generatednames.json");
    tokio::fs::write(&path, serde_json::to_string_pretty(&records).unwrap())
        .await
        .unwrap();
    LegacyNameStore::new(path)
}

fn record(resource_name: &str, user: &str, created_on: &str) -> Value {
    json!({
        "ResourceName": resource_name,
        "ResourceTypeName": "vm",
        "User": user,
        "CreatedOn": created_on,
        "Components": [["ResourceType", "vm"]]
    })
}

fn three_records() -> Value {
    json!([
        record("vm-01", "alice", "2024-01-01T00:00:00Z"),
        record("vm-02", "alice", "2024-01-02T00:00:00Z"),
        record("vm-03", "bob", "2024-01-03T00:00:00Z"),
    ])
}

fn backups_in(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().contains("_backup_"))
        .count()
}

// ---------------------------------------------------------------------------
// Test: end-to-end automatic migration
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_migrate_if_needed_single_record(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let legacy = legacy_file(
        &dir,
        json!([{
            "resourceName": "vm-prod-01",
            "user": "alice",
            "createdOn": "2024-01-01T00:00:00Z",
            "components": [["ResourceType", "vm"], ["Env", "prod"]]
        }]),
    )
    .await;
    let service = MigrationService::new(pool.clone(), legacy, true);

    assert!(service.is_json_migration_needed().await);
    assert!(service.migrate_from_json_if_needed().await);

    let recent = GeneratedNameRepo::get_recent(&pool, 10).await.unwrap();
    assert_eq!(recent.len(), 1);
    let record = GeneratedNameRepo::get_by_id(&pool, recent[0].id)
        .await
        .unwrap()
        .expect("migrated record should be visible");

    assert_eq!(record.resource_name, "vm-prod-01");
    assert_eq!(record.user_name, "alice");
    assert_eq!(record.created_by, "Migration");
    assert_eq!(record.created_at, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let components: Vec<(&str, &str)> = record
        .components
        .iter()
        .map(|c| (c.component_name.as_str(), c.component_value.as_str()))
        .collect();
    assert_eq!(components, vec![("ResourceType", "vm"), ("Env", "prod")]);

    assert!(!service.is_json_migration_needed().await);
    assert_eq!(backups_in(&dir), 1, "automatic migration writes a backup");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_migrate_if_needed_skips_populated_store(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let legacy = legacy_file(&dir, three_records()).await;
    let service = MigrationService::new(pool.clone(), legacy, true);

    let existing = namelog_db::models::generated_name::CreateGeneratedName {
        resource_name: "native".to_string(),
        ..Default::default()
    };
    GeneratedNameRepo::create(&pool, &existing).await.unwrap();

    assert!(!service.is_json_migration_needed().await);
    assert!(service.migrate_from_json_if_needed().await);
    assert_eq!(GeneratedNameRepo::count_all_rows(&pool).await.unwrap(), 1);
    assert_eq!(backups_in(&dir), 0);
}

// ---------------------------------------------------------------------------
// Test: idempotency and dedupe
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_migration_is_idempotent(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let legacy = legacy_file(&dir, three_records()).await;
    let service = MigrationService::new(pool.clone(), legacy, true);

    let first = service.migrate_from_json(false).await;
    assert!(first.success, "{}", first.message);
    assert_eq!(first.migrated_count, 3);
    assert_eq!(first.total_count, 3);
    assert!(first.is_complete_success());
    assert!(first.finished_at.is_some());

    let second = service.migrate_from_json(false).await;
    assert!(second.success, "{}", second.message);
    assert_eq!(second.migrated_count, 0);
    assert_eq!(second.skipped_count, 3);
    assert_eq!(GeneratedNameRepo::count_all_rows(&pool).await.unwrap(), 3);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_sub_microsecond_timestamps_still_dedupe(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let legacy = legacy_file(
        &dir,
        json!([record("vm-01", "alice", "2024-03-05T10:20:30.1234567")]),
    )
    .await;
    let service = MigrationService::new(pool.clone(), legacy, true);

    assert_eq!(service.migrate_from_json(false).await.migrated_count, 1);
    let second = service.migrate_from_json(false).await;
    assert_eq!(second.migrated_count, 0);
    assert_eq!(second.skipped_count, 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_duplicates_within_file_are_skipped(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let legacy = legacy_file(
        &dir,
        json!([
            record("vm-01", "alice", "2024-01-01T00:00:00Z"),
            record("vm-01", "alice", "2024-01-01T00:00:00Z"),
            record("vm-01", "bob", "2024-01-01T00:00:00Z"),
        ]),
    )
    .await;
    let service = MigrationService::new(pool.clone(), legacy, true);

    let result = service.migrate_from_json(false).await;
    assert!(result.success);
    assert_eq!(result.migrated_count, 2);
    assert_eq!(result.skipped_count, 1);
    assert_eq!(result.summary(), "Migrated 2 of 3 records, skipped 1 duplicates");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_soft_deleted_rows_are_reimported(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let legacy = legacy_file(&dir, three_records()).await;
    let service = MigrationService::new(pool.clone(), legacy, true);

    service.migrate_from_json(false).await;
    for record in GeneratedNameRepo::get_recent(&pool, 10).await.unwrap() {
        GeneratedNameRepo::soft_delete(&pool, record.id).await.unwrap();
    }

    assert!(service.is_json_migration_needed().await);
    let status = service.get_migration_status().await;
    assert_eq!(status.database_record_count, 0);
    assert!(status.json_migration_needed);

    let result = service.migrate_from_json(false).await;
    assert!(result.success);
    assert_eq!(result.migrated_count, 3);
    assert_eq!(result.skipped_count, 0);
    assert_eq!(GeneratedNameRepo::get_count(&pool).await.unwrap(), 3);
    assert_eq!(GeneratedNameRepo::count_all_rows(&pool).await.unwrap(), 6);
}

// ---------------------------------------------------------------------------
// Test: per-record and batch-fatal failures
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_malformed_records_are_isolated(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let legacy = legacy_file(
        &dir,
        json!([
            record("vm-01", "alice", "2024-01-01T00:00:00Z"),
            { "User": "alice", "CreatedOn": "2024-01-02T00:00:00Z" },
            record("vm-03", "alice", "2024-01-03T00:00:00Z"),
            record("vm-04", "alice", "last tuesday"),
            record("vm-05", "alice", "2024-01-05T00:00:00Z"),
            record(&"x".repeat(300), "alice", "2024-01-06T00:00:00Z"),
        ]),
    )
    .await;
    let service = MigrationService::new(pool.clone(), legacy, true);

    let result = service.migrate_from_json(false).await;
    assert!(result.success, "per-record errors do not abort the run");
    assert!(!result.is_complete_success());
    assert_eq!(result.total_count, 6);
    assert_eq!(result.migrated_count, 3);
    assert_eq!(result.error_count, 3);
    assert_eq!(result.errors.len(), 3);
    assert!(result.errors[1].contains("vm-04"));
    assert_eq!(result.message, "Migrated 3 of 6 records with 3 errors");
    assert_eq!(GeneratedNameRepo::count_all_rows(&pool).await.unwrap(), 3);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_storage_failure_rolls_back_everything(pool: PgPool) {
    sqlx::query(
        "ALTER TABLE generated_name_components \
         ADD CONSTRAINT ck_test_reject_boom CHECK (component_value <> 'boom')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let mut records: Vec<Value> = (0..150)
        .map(|i| record(&format!("vm-{i:03}"), "alice", "2024-01-01T00:00:00Z"))
        .collect();
    records.push(json!({
        "ResourceName": "vm-boom",
        "User": "alice",
        "CreatedOn": "2024-01-02T00:00:00Z",
        "Components": [["Env", "boom"]]
    }));

    let dir = TempDir::new().unwrap();
    let legacy = legacy_file(&dir, Value::Array(records)).await;
    let service = MigrationService::new(pool.clone(), legacy, true);

    let result = service.migrate_from_json(true).await;
    assert!(!result.success);
    assert!(result.message.starts_with("Migration failed:"), "{}", result.message);
    assert_eq!(result.migrated_count, 0);
    assert!(!result.errors.is_empty());
    assert!(result.backup_file_path.is_some());
    assert_eq!(
        GeneratedNameRepo::count_all_rows(&pool).await.unwrap(),
        0,
        "the first flushed batch must be rolled back too"
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_cancelled_run_rolls_back(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let legacy = legacy_file(&dir, three_records()).await;
    let service = MigrationService::new(pool.clone(), legacy, true);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = service.migrate_from_json_with_cancel(false, &cancel).await;

    assert!(!result.success);
    assert!(result.message.contains("cancelled"), "{}", result.message);
    assert_eq!(GeneratedNameRepo::count_all_rows(&pool).await.unwrap(), 0);

    // The in-progress flag is released afterwards.
    let retry = service.migrate_from_json(false).await;
    assert!(retry.success);
    assert_eq!(retry.migrated_count, 3);
}

// ---------------------------------------------------------------------------
// Test: disabled, empty and large sources
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_disabled_migration(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let legacy = legacy_file(&dir, three_records()).await;
    let service = MigrationService::new(pool.clone(), legacy, false);

    assert!(service.migrate_from_json_if_needed().await);
    let result = service.migrate_from_json(true).await;
    assert!(!result.success);
    assert_eq!(result.message, "Migration is disabled in configuration");
    assert_eq!(GeneratedNameRepo::count_all_rows(&pool).await.unwrap(), 0);
    assert_eq!(backups_in(&dir), 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_empty_or_missing_source(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let missing = MigrationService::new(
        pool.clone(),
        LegacyNameStore::new(dir.path().join("absent.json")),
        true,
    );
    assert!(!missing.is_json_migration_needed().await);
    let result = missing.migrate_from_json(true).await;
    assert!(result.success);
    assert_eq!(result.total_count, 0);

    let legacy = legacy_file(&dir, json!([])).await;
    let empty = MigrationService::new(pool.clone(), legacy, true);
    assert!(!empty.is_json_migration_needed().await);
    assert!(empty.migrate_from_json_if_needed().await);
    let result = empty.migrate_from_json(true).await;
    assert!(result.success);
    assert_eq!(result.message, "No data to migrate - legacy file is empty");
    assert_eq!(backups_in(&dir), 0);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_unparseable_file_fails_the_run(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("generatednames.json");
    tokio::fs::write(&path, "[{ broken").await.unwrap();
    let service = MigrationService::new(pool.clone(), LegacyNameStore::new(path), true);

    let result = service.migrate_from_json(true).await;
    assert!(!result.success);
    assert!(result.message.starts_with("Migration failed:"));
    assert!(
        !service.is_json_migration_needed().await,
        "an unreadable source is reported as not needing migration"
    );
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_large_source_spans_several_batches(pool: PgPool) {
    let records: Vec<Value> = (0..250)
        .map(|i| record(&format!("vm-{i:03}"), "alice", "2024-01-01T00:00:00Z"))
        .collect();
    let dir = TempDir::new().unwrap();
    let legacy = legacy_file(&dir, Value::Array(records)).await;
    let service = MigrationService::new(pool.clone(), legacy, true);

    let result = service.migrate_from_json(false).await;
    assert!(result.is_complete_success());
    assert_eq!(result.migrated_count, 250);
    assert_eq!(GeneratedNameRepo::count_all_rows(&pool).await.unwrap(), 250);
}

// ---------------------------------------------------------------------------
// Test: schema validation and status
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn test_validate_database_schema(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let legacy = LegacyNameStore::new(dir.path().join("x.json"));
    let service = MigrationService::new(pool, legacy, true);
    assert!(service.validate_database_schema().await);
}

#[sqlx::test(migrations = false)]
async fn test_validate_database_schema_applies_missing_schema(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let legacy = legacy_file(&dir, three_records()).await;
    let service = MigrationService::new(pool.clone(), legacy, true);

    assert!(service.validate_database_schema().await);
    assert!(service.is_json_migration_needed().await);

    let result = service.migrate_from_json(false).await;
    assert!(result.success, "{}", result.message);
    assert_eq!(result.migrated_count, 3);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_migration_status(pool: PgPool) {
    let dir = TempDir::new().unwrap();
    let legacy = legacy_file(&dir, three_records()).await;
    let service = MigrationService::new(pool.clone(), legacy, true);

    let before = service.get_migration_status().await;
    assert!(before.database_connected);
    assert!(before.migration_enabled);
    assert_eq!(before.database_record_count, 0);
    assert_eq!(before.json_record_count, 3);
    assert!(before.json_migration_needed);
    assert!(before.last_migration_date.is_none());

    service.migrate_from_json(false).await;

    let after = service.get_migration_status().await;
    assert_eq!(after.database_record_count, 3);
    assert!(!after.json_migration_needed);
    assert_eq!(
        after.last_migration_date,
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    );
    assert!(after.error_message.is_none());
}
