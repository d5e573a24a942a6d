//! Result and status types for the legacy flat-file migration.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::types::Timestamp;

/// Flush staged inserts to the store every this many records.
pub const MIGRATION_FLUSH_BATCH: usize = 100;

/// Outcome of one migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    pub success: bool,
    pub message: String,
    /// Records inserted by this run.
    pub migrated_count: usize,
    /// Records skipped because an identical row already existed.
    pub skipped_count: usize,
    /// Records that failed to decode or validate.
    pub error_count: usize,
    /// Records found in the legacy source.
    pub total_count: usize,
    pub errors: Vec<String>,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub elapsed: Duration,
    pub backup_file_path: Option<String>,
}

impl MigrationResult {
    /// A blank result for a run starting now.
    pub fn started() -> Self {
        Self {
            success: false,
            message: String::new(),
            migrated_count: 0,
            skipped_count: 0,
            error_count: 0,
            total_count: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            elapsed: Duration::ZERO,
            backup_file_path: None,
        }
    }

    /// Record a per-record failure.
    pub fn push_record_error(&mut self, error: String) {
        self.errors.push(error);
        self.error_count = self.errors.len();
    }

    /// Mark the run as aborted. The error text becomes part of the message
    /// and is appended to the error list.
    pub fn fail(&mut self, error: impl std::fmt::Display) {
        let error = error.to_string();
        self.success = false;
        self.message = format!("Migration failed: {error}");
        self.errors.push(error);
    }

    /// Stamp the end time and elapsed duration.
    pub fn finish(&mut self, elapsed: Duration) {
        self.finished_at = Some(Utc::now());
        self.elapsed = elapsed;
    }

    /// Summary line for a committed run.
    pub fn summary(&self) -> String {
        let mut message = format!(
            "Migrated {} of {} records",
            self.migrated_count, self.total_count
        );
        if self.skipped_count > 0 {
            message.push_str(&format!(", skipped {} duplicates", self.skipped_count));
        }
        if self.error_count > 0 {
            message.push_str(&format!(" with {} errors", self.error_count));
        }
        message
    }

    /// Migrated records as a percentage of the total, 0 when nothing was found.
    pub fn success_rate(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.migrated_count as f64 / self.total_count as f64 * 100.0
    }

    pub fn is_complete_success(&self) -> bool {
        self.success && self.error_count == 0
    }
}

/// Snapshot of the migration state, for diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationStatus {
    pub database_connected: bool,
    pub database_record_count: i64,
    pub json_record_count: usize,
    pub migration_enabled: bool,
    pub json_migration_needed: bool,
    /// Earliest creation time among migrated rows. A proxy only: it is the
    /// oldest migrated record, not when the migration ran.
    pub last_migration_date: Option<Timestamp>,
    pub error_message: Option<String>,
}
