//! Periodic purge of old generated-name records.
//!
//! Deletes records created more than `retention_days` ago, on a fixed
//! `tokio::time::interval`. Only spawned when a retention period is
//! configured.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use namelog_core::types::Timestamp;
use namelog_db::repositories::GeneratedNameRepo;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// How often the cleanup job runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Run the retention loop until `cancel` is triggered.
pub async fn run(pool: PgPool, retention_days: i64, cancel: CancellationToken) {
    tracing::info!(
        retention_days,
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Generated name retention job started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Generated name retention job stopping");
                break;
            }
            _ = interval.tick() => {
                let Some(cutoff) = retention_cutoff(Utc::now(), retention_days) else {
                    tracing::warn!(retention_days, "Retention: cutoff out of range, skipping");
                    continue;
                };
                match GeneratedNameRepo::cleanup_old_records(&pool, cutoff).await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::info!(deleted, "Retention: purged old records");
                    }
                    Ok(_) => tracing::debug!("Retention: no records to purge"),
                    Err(e) => {
                        tracing::error!(error = %e, "Retention: cleanup failed");
                    }
                }
            }
        }
    }
}

/// `now - retention_days`, or `None` when that is not a representable time.
fn retention_cutoff(now: Timestamp, retention_days: i64) -> Option<Timestamp> {
    TimeDelta::try_days(retention_days).and_then(|age| now.checked_sub_signed(age))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn cutoff_is_retention_days_ago() {
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(retention_cutoff(now, 30), Some(expected));
    }

    #[test]
    fn unrepresentable_cutoff_is_none() {
        assert_eq!(retention_cutoff(Utc::now(), 1_000_000_000), None);
        assert_eq!(retention_cutoff(Utc::now(), i64::MAX), None);
    }
}
