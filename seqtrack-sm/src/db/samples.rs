//! Sample table operations

use chrono::{DateTime, Utc};
use seqtrack_common::models::{
    Priority, Sample, SampleFilter, SampleId, SamplePatch, SampleStatistics, SampleStatus,
    DEFAULT_STEP_COUNT,
};
use seqtrack_common::time::parse_timestamp;
use seqtrack_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::{format_ts, parse_uuid};

const SAMPLE_COLUMNS: &str = "id, name, status, priority, workflow_stage, assigned_to, \
     library_prep_by, lab_name, submitter_name, submitter_email, notes, \
     submitted_at, created_at, updated_at";

fn sample_from_row(row: &SqliteRow) -> Result<Sample> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    let priority: String = row.get("priority");
    let workflow_stage: Option<String> = row.get("workflow_stage");
    let submitted_at: String = row.get("submitted_at");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Sample {
        id: parse_uuid(&id)?,
        name: row.get("name"),
        status: status.parse()?,
        priority: priority.parse()?,
        workflow_stage: workflow_stage.map(|s| s.parse()).transpose()?,
        assigned_to: row.get("assigned_to"),
        library_prep_by: row.get("library_prep_by"),
        lab_name: row.get("lab_name"),
        submitter_name: row.get("submitter_name"),
        submitter_email: row.get("submitter_email"),
        notes: row.get("notes"),
        submitted_at: parse_timestamp(&submitted_at)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

pub async fn insert_sample(pool: &SqlitePool, sample: &Sample) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO samples (
            id, name, status, priority, workflow_stage, assigned_to,
            library_prep_by, lab_name, submitter_name, submitter_email, notes,
            submitted_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(sample.id.to_string())
    .bind(&sample.name)
    .bind(sample.status.as_str())
    .bind(sample.priority.as_str())
    .bind(sample.workflow_stage.map(|s| s.as_str()))
    .bind(&sample.assigned_to)
    .bind(&sample.library_prep_by)
    .bind(&sample.lab_name)
    .bind(&sample.submitter_name)
    .bind(&sample.submitter_email)
    .bind(&sample.notes)
    .bind(format_ts(sample.submitted_at))
    .bind(format_ts(sample.created_at))
    .bind(format_ts(sample.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn fetch_sample(pool: &SqlitePool, id: SampleId) -> Result<Option<Sample>> {
    let row = sqlx::query(&format!("SELECT {} FROM samples WHERE id = ?", SAMPLE_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(sample_from_row).transpose()
}

pub async fn sample_exists(pool: &SqlitePool, id: SampleId) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM samples WHERE id = ?")
        .bind(id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// Newest first; ties broken by insertion order
pub async fn list_samples(pool: &SqlitePool, filter: &SampleFilter) -> Result<Vec<Sample>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM samples WHERE 1 = 1", SAMPLE_COLUMNS));

    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND priority = ").push_bind(priority.as_str());
    }
    if let Some(assigned_to) = &filter.assigned_to {
        qb.push(" AND assigned_to = ").push_bind(assigned_to.clone());
    }

    qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
        .push_bind(filter.effective_limit() as i64)
        .push(" OFFSET ")
        .push_bind(filter.skip.unwrap_or(0) as i64);

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(sample_from_row).collect()
}

/// Write the provided fields in one statement and return the updated row,
/// or `None` when the sample does not exist
pub async fn patch_sample(
    pool: &SqlitePool,
    id: SampleId,
    patch: &SamplePatch,
    now: DateTime<Utc>,
) -> Result<Option<Sample>> {
    let result = sqlx::query(
        r#"
        UPDATE samples SET
            name = COALESCE(?, name),
            status = COALESCE(?, status),
            priority = COALESCE(?, priority),
            workflow_stage = COALESCE(?, workflow_stage),
            assigned_to = COALESCE(?, assigned_to),
            library_prep_by = COALESCE(?, library_prep_by),
            lab_name = COALESCE(?, lab_name),
            submitter_name = COALESCE(?, submitter_name),
            submitter_email = COALESCE(?, submitter_email),
            notes = COALESCE(?, notes),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&patch.name)
    .bind(patch.status.map(|s| s.as_str()))
    .bind(patch.priority.map(|p| p.as_str()))
    .bind(patch.workflow_stage.map(|s| s.as_str()))
    .bind(&patch.assigned_to)
    .bind(&patch.library_prep_by)
    .bind(&patch.lab_name)
    .bind(&patch.submitter_name)
    .bind(&patch.submitter_email)
    .bind(&patch.notes)
    .bind(format_ts(now))
    .bind(id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    fetch_sample(pool, id).await
}

/// Delete a sample and its processing steps; false when nothing was deleted
pub async fn delete_sample(pool: &SqlitePool, id: SampleId) -> Result<bool> {
    let id = id.to_string();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM processing_steps WHERE sample_id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM samples WHERE id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(result.rows_affected() > 0)
}

pub async fn statistics(pool: &SqlitePool) -> Result<SampleStatistics> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM samples")
        .fetch_one(pool)
        .await?;

    let mut stats = SampleStatistics {
        total_samples: total as u64,
        status_breakdown: SampleStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect(),
        priority_breakdown: Priority::ALL
            .iter()
            .map(|p| (p.as_str().to_string(), 0))
            .collect(),
        mean_step_progress: 0.0,
    };

    let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM samples GROUP BY status")
        .fetch_all(pool)
        .await?;
    for row in rows {
        let n: i64 = row.get("n");
        stats.status_breakdown.insert(row.get("status"), n as u64);
    }

    let rows = sqlx::query("SELECT priority, COUNT(*) AS n FROM samples GROUP BY priority")
        .fetch_all(pool)
        .await?;
    for row in rows {
        let n: i64 = row.get("n");
        stats.priority_breakdown.insert(row.get("priority"), n as u64);
    }

    let mean: Option<f64> = sqlx::query_scalar(
        r#"
        SELECT AVG(done * 1.0 / ?) FROM (
            SELECT SUM(CASE WHEN step_status = 'completed' THEN 1 ELSE 0 END) AS done
            FROM processing_steps
            GROUP BY sample_id
        )
        "#,
    )
    .bind(DEFAULT_STEP_COUNT as i64)
    .fetch_one(pool)
    .await?;
    stats.mean_step_progress = mean.unwrap_or(0.0);

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{stamp, test_pool};
    use seqtrack_common::models::{NewSample, StepName};

    fn new_sample(name: &str) -> Sample {
        Sample::from_new(
            NewSample {
                name: name.into(),
                ..Default::default()
            },
            stamp(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_fetch_round_trip() {
        let pool = test_pool().await;
        let mut sample = new_sample("S-100");
        sample.workflow_stage = Some(StepName::LibraryPrep);
        sample.lab_name = Some("Genomics Core".into());

        insert_sample(&pool, &sample).await.unwrap();
        let loaded = fetch_sample(&pool, sample.id).await.unwrap().unwrap();
        assert_eq!(loaded, sample);
    }

    #[tokio::test]
    async fn test_patch_missing_sample_returns_none() {
        let pool = test_pool().await;
        let patch = SamplePatch::status(SampleStatus::Prep);
        let result = patch_sample(&pool, uuid::Uuid::new_v4(), &patch, stamp())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_patch_keeps_unset_fields() {
        let pool = test_pool().await;
        let mut sample = new_sample("S-101");
        sample.submitter_name = Some("Dr. Okafor".into());
        insert_sample(&pool, &sample).await.unwrap();

        let patch = SamplePatch {
            priority: Some(Priority::High),
            ..Default::default()
        };
        let updated = patch_sample(&pool, sample.id, &patch, stamp())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.submitter_name.as_deref(), Some("Dr. Okafor"));
        assert_eq!(updated.status, SampleStatus::Submitted);
    }

    #[tokio::test]
    async fn test_list_newest_first_with_filters() {
        let pool = test_pool().await;
        let base = stamp();
        for i in 0..5 {
            let mut s = new_sample(&format!("S-{i}"));
            s.created_at = base + chrono::Duration::seconds(i);
            if i % 2 == 0 {
                s.priority = Priority::Urgent;
            }
            insert_sample(&pool, &s).await.unwrap();
        }

        let all = list_samples(&pool, &SampleFilter::default()).await.unwrap();
        let names: Vec<&str> = all.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["S-4", "S-3", "S-2", "S-1", "S-0"]);

        let urgent = list_samples(
            &pool,
            &SampleFilter {
                priority: Some(Priority::Urgent),
                skip: Some(1),
                limit: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(urgent.len(), 1);
        assert_eq!(urgent[0].name, "S-2");
    }

    #[tokio::test]
    async fn test_delete_reports_absence() {
        let pool = test_pool().await;
        let sample = new_sample("S-102");
        insert_sample(&pool, &sample).await.unwrap();

        assert!(delete_sample(&pool, sample.id).await.unwrap());
        assert!(!delete_sample(&pool, sample.id).await.unwrap());
        assert!(!sample_exists(&pool, sample.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_statistics_breakdowns() {
        let pool = test_pool().await;
        let mut a = new_sample("A");
        a.status = SampleStatus::Prep;
        insert_sample(&pool, &a).await.unwrap();
        insert_sample(&pool, &new_sample("B")).await.unwrap();

        let stats = statistics(&pool).await.unwrap();
        assert_eq!(stats.total_samples, 2);
        assert_eq!(stats.status_breakdown["prep"], 1);
        assert_eq!(stats.status_breakdown["submitted"], 1);
        assert_eq!(stats.status_breakdown["archived"], 0);
        assert_eq!(stats.priority_breakdown["normal"], 2);
        assert_eq!(stats.mean_step_progress, 0.0);
    }
}
