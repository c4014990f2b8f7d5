//! Processing step table operations

use chrono::{DateTime, Utc};
use seqtrack_common::models::{ProcessingStep, SampleId, StepId, StepPatch, StepStatus};
use seqtrack_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{format_ts, parse_opt_ts, parse_uuid};
use seqtrack_common::time::parse_timestamp;

const STEP_COLUMNS: &str = "id, sample_id, step_name, step_order, step_status, assigned_to, \
     started_at, completed_at, estimated_duration_hours, actual_duration_hours, notes, \
     results_data, created_at, updated_at";

fn step_from_row(row: &SqliteRow) -> Result<ProcessingStep> {
    let id: String = row.get("id");
    let sample_id: String = row.get("sample_id");
    let step_name: String = row.get("step_name");
    let step_status: String = row.get("step_status");
    let step_order: i64 = row.get("step_order");
    let results_data: Option<String> = row.get("results_data");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    let results_data = results_data
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to deserialize results_data: {}", e)))?;

    Ok(ProcessingStep {
        id: parse_uuid(&id)?,
        sample_id: parse_uuid(&sample_id)?,
        step_name: step_name.parse()?,
        step_order: step_order as u32,
        step_status: step_status.parse()?,
        assigned_to: row.get("assigned_to"),
        started_at: parse_opt_ts(row.get("started_at"))?,
        completed_at: parse_opt_ts(row.get("completed_at"))?,
        estimated_duration_hours: row.get("estimated_duration_hours"),
        actual_duration_hours: row.get("actual_duration_hours"),
        notes: row.get("notes"),
        results_data,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn encode_results(step: &ProcessingStep) -> Result<Option<String>> {
    step.results_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to serialize results_data: {}", e)))
}

/// Insert steps, skipping any whose (sample_id, step_name) already exists
pub async fn insert_steps_if_absent(pool: &SqlitePool, steps: &[ProcessingStep]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for step in steps {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO processing_steps (
                id, sample_id, step_name, step_order, step_status, assigned_to,
                started_at, completed_at, estimated_duration_hours, actual_duration_hours,
                notes, results_data, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(step.id.to_string())
        .bind(step.sample_id.to_string())
        .bind(step.step_name.as_str())
        .bind(step.step_order as i64)
        .bind(step.step_status.as_str())
        .bind(&step.assigned_to)
        .bind(step.started_at.map(format_ts))
        .bind(step.completed_at.map(format_ts))
        .bind(step.estimated_duration_hours)
        .bind(step.actual_duration_hours)
        .bind(&step.notes)
        .bind(encode_results(step)?)
        .bind(format_ts(step.created_at))
        .bind(format_ts(step.updated_at))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Steps for a sample in positional order
pub async fn fetch_steps(pool: &SqlitePool, sample_id: SampleId) -> Result<Vec<ProcessingStep>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM processing_steps WHERE sample_id = ? ORDER BY step_order",
        STEP_COLUMNS
    ))
    .bind(sample_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(step_from_row).collect()
}

pub async fn fetch_step(pool: &SqlitePool, step_id: StepId) -> Result<Option<ProcessingStep>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM processing_steps WHERE id = ?",
        STEP_COLUMNS
    ))
    .bind(step_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(step_from_row).transpose()
}

/// Persist a transitioned step only if its stored status is still `expected`
///
/// Returns false when another writer moved the step first.
pub async fn write_transition(
    pool: &SqlitePool,
    step: &ProcessingStep,
    expected: StepStatus,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE processing_steps SET
            step_status = ?,
            assigned_to = ?,
            started_at = ?,
            completed_at = ?,
            actual_duration_hours = ?,
            notes = ?,
            results_data = ?,
            updated_at = ?
        WHERE id = ? AND step_status = ?
        "#,
    )
    .bind(step.step_status.as_str())
    .bind(&step.assigned_to)
    .bind(step.started_at.map(format_ts))
    .bind(step.completed_at.map(format_ts))
    .bind(step.actual_duration_hours)
    .bind(&step.notes)
    .bind(encode_results(step)?)
    .bind(format_ts(step.updated_at))
    .bind(step.id.to_string())
    .bind(expected.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Apply an annotation patch; `None` when the step does not exist
pub async fn patch_step(
    pool: &SqlitePool,
    step_id: StepId,
    patch: &StepPatch,
    now: DateTime<Utc>,
) -> Result<Option<ProcessingStep>> {
    let result = sqlx::query(
        r#"
        UPDATE processing_steps SET
            notes = COALESCE(?, notes),
            estimated_duration_hours = COALESCE(?, estimated_duration_hours),
            assigned_to = COALESCE(?, assigned_to),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&patch.notes)
    .bind(patch.estimated_duration_hours)
    .bind(&patch.assigned_to)
    .bind(format_ts(now))
    .bind(step_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    fetch_step(pool, step_id).await
}
