//! Database access for seqtrack-sm
//!
//! UUIDs and enumerations are stored as TEXT; timestamps as fixed-width
//! RFC 3339 TEXT (microseconds, `Z` suffix) so lexical order is time order.

pub mod samples;
pub mod steps;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use seqtrack_common::time::parse_timestamp;
use sqlx::SqlitePool;
use std::path::Path;
use uuid::Uuid;

/// Initialize database connection pool and create tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the samples and processing_steps tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS samples (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            status TEXT NOT NULL,
            priority TEXT NOT NULL,
            workflow_stage TEXT,
            assigned_to TEXT,
            library_prep_by TEXT,
            lab_name TEXT,
            submitter_name TEXT,
            submitter_email TEXT,
            notes TEXT,
            submitted_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processing_steps (
            id TEXT PRIMARY KEY,
            sample_id TEXT NOT NULL REFERENCES samples(id) ON DELETE CASCADE,
            step_name TEXT NOT NULL,
            step_order INTEGER NOT NULL,
            step_status TEXT NOT NULL,
            assigned_to TEXT,
            started_at TEXT,
            completed_at TEXT,
            estimated_duration_hours INTEGER,
            actual_duration_hours REAL,
            notes TEXT,
            results_data TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (sample_id, step_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_samples_created_at ON samples(created_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_processing_steps_sample ON processing_steps(sample_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (samples, processing_steps)");

    Ok(())
}

/// Current time at the precision the database keeps
pub fn stamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_uuid(value: &str) -> seqtrack_common::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| seqtrack_common::Error::Internal(format!("Invalid id '{}': {}", value, e)))
}

pub(crate) fn parse_opt_ts(value: Option<String>) -> seqtrack_common::Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    // One connection: every :memory: connection is its own database
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    init_tables(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_sort_lexically() {
        let early = stamp();
        let late = early + chrono::Duration::milliseconds(1500);
        assert!(format_ts(early) < format_ts(late));
        assert_eq!(format_ts(early).len(), format_ts(late).len());
    }

    #[test]
    fn test_stamp_survives_round_trip() {
        let ts = stamp();
        assert_eq!(parse_timestamp(&format_ts(ts)).unwrap(), ts);
    }

    #[tokio::test]
    async fn test_init_tables_is_idempotent() {
        let pool = test_pool().await;
        init_tables(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('samples', 'processing_steps')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 2);
    }
}
