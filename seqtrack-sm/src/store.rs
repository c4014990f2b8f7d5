//! SQLite-backed `SampleStore`
//!
//! Every successful write emits a `TrackerEvent` on the shared bus. Step
//! transitions are validated with the processing step engine against the
//! stored row, then persisted with a conditional update on the prior status.

use chrono::{DateTime, Utc};
use seqtrack_common::bulk::{self, ValidatedBulk};
use seqtrack_common::error::StateError;
use seqtrack_common::events::{EventBus, TrackerEvent};
use seqtrack_common::models::{
    AssignRequest, BatchReport, BulkOperationRequest, NewSample, ProcessingStep, Sample,
    SampleFilter, SampleId, SamplePatch, SampleStatistics, SampleStatus, StepId, StepPatch,
};
use seqtrack_common::steps::{self, ProcessingSteps};
use seqtrack_common::{MutationError, SampleStore, StoreResult};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::{self, samples, steps as step_rows};

#[derive(Clone)]
pub struct SqliteSampleStore {
    pool: SqlitePool,
    event_bus: EventBus,
    bulk_concurrency: usize,
}

impl SqliteSampleStore {
    pub fn new(pool: SqlitePool, event_bus: EventBus, bulk_concurrency: usize) -> Self {
        Self {
            pool,
            event_bus,
            bulk_concurrency: bulk_concurrency.max(1),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn sample_not_found(id: SampleId) -> MutationError {
        MutationError::NotFound(format!("sample {} not found", id))
    }

    fn step_not_found(id: StepId) -> MutationError {
        MutationError::NotFound(format!("step {} not found", id))
    }

    async fn patch(&self, id: SampleId, patch: &SamplePatch) -> StoreResult<Sample> {
        let sample = samples::patch_sample(&self.pool, id, patch, db::stamp())
            .await?
            .ok_or_else(|| Self::sample_not_found(id))?;

        self.event_bus.emit_lossy(TrackerEvent::SampleUpdated {
            sample_id: sample.id,
            status: sample.status,
            timestamp: sample.updated_at,
        });
        Ok(sample)
    }

    /// Load the step, run `transition` on a copy, and persist it if nobody
    /// moved the step in the meantime
    async fn transition<F>(&self, step_id: StepId, transition: F) -> StoreResult<ProcessingStep>
    where
        F: FnOnce(&mut ProcessingStep, DateTime<Utc>) -> Result<(), StateError> + Send,
    {
        let current = step_rows::fetch_step(&self.pool, step_id)
            .await?
            .ok_or_else(|| Self::step_not_found(step_id))?;

        let mut next = current.clone();
        transition(&mut next, db::stamp())
            .map_err(|e| MutationError::Conflict(e.to_string()))?;

        if !step_rows::write_transition(&self.pool, &next, current.step_status).await? {
            return Err(MutationError::Conflict(format!(
                "step {} changed concurrently",
                step_id
            )));
        }

        debug!(
            step_id = %step_id,
            step_name = %next.step_name,
            from = %current.step_status,
            to = %next.step_status,
            "Step transitioned"
        );
        self.event_bus.emit_lossy(TrackerEvent::StepStatusChanged {
            step_id,
            sample_id: next.sample_id,
            step_name: next.step_name,
            old_status: current.step_status,
            new_status: next.step_status,
            timestamp: next.updated_at,
        });
        Ok(next)
    }

    async fn apply_bulk(&self, validated: &ValidatedBulk) -> BatchReport {
        let patch = validated.patch();
        bulk::dispatch(
            validated.target_ids.iter().copied(),
            self.bulk_concurrency,
            |id| self.patch(id, &patch),
        )
        .await
    }
}

#[async_trait::async_trait]
impl SampleStore for SqliteSampleStore {
    async fn create_sample(&self, fields: NewSample) -> StoreResult<Sample> {
        if fields.name.trim().is_empty() {
            return Err(MutationError::Invalid("name must not be empty".into()));
        }

        let sample = Sample::from_new(fields, db::stamp());
        samples::insert_sample(&self.pool, &sample).await?;

        info!(sample_id = %sample.id, name = %sample.name, "Sample created");
        self.event_bus.emit_lossy(TrackerEvent::SampleCreated {
            sample_id: sample.id,
            name: sample.name.clone(),
            timestamp: sample.created_at,
        });
        Ok(sample)
    }

    async fn get_sample(&self, id: SampleId) -> StoreResult<Sample> {
        samples::fetch_sample(&self.pool, id)
            .await?
            .ok_or_else(|| Self::sample_not_found(id))
    }

    async fn list_samples(&self, filter: &SampleFilter) -> StoreResult<Vec<Sample>> {
        Ok(samples::list_samples(&self.pool, filter).await?)
    }

    async fn update_sample(&self, id: SampleId, patch: &SamplePatch) -> StoreResult<Sample> {
        self.patch(id, patch).await
    }

    async fn assign_sample(&self, id: SampleId, assignment: &AssignRequest) -> StoreResult<Sample> {
        if assignment.assigned_to.trim().is_empty() {
            return Err(MutationError::Invalid("assigned_to must not be empty".into()));
        }
        self.patch(id, &assignment.patch()).await
    }

    async fn delete_sample(&self, id: SampleId) -> StoreResult<()> {
        if !samples::delete_sample(&self.pool, id).await? {
            return Err(Self::sample_not_found(id));
        }

        info!(sample_id = %id, "Sample deleted");
        self.event_bus.emit_lossy(TrackerEvent::SampleDeleted {
            sample_id: id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn update_sample_status(&self, id: SampleId, status: SampleStatus) -> StoreResult<Sample> {
        self.patch(id, &SamplePatch::status(status)).await
    }

    async fn bulk_apply(&self, request: &BulkOperationRequest) -> seqtrack_common::Result<BatchReport> {
        let validated = bulk::validate(request)?;
        let report = self.apply_bulk(&validated).await;

        info!(
            operation = %validated.kind(),
            succeeded = report.succeeded_ids.len(),
            failed = report.failed.len(),
            "Bulk operation settled: {}",
            report.summary()
        );
        self.event_bus.emit_lossy(TrackerEvent::BulkOperationCompleted {
            operation_kind: validated.kind(),
            succeeded: report.succeeded_ids.len(),
            failed: report.failed.len(),
            timestamp: Utc::now(),
        });
        Ok(report)
    }

    async fn create_default_steps(&self, sample_id: SampleId) -> StoreResult<Vec<ProcessingStep>> {
        if !samples::sample_exists(&self.pool, sample_id).await? {
            return Err(Self::sample_not_found(sample_id));
        }

        let existing = step_rows::fetch_steps(&self.pool, sample_id).await?;
        let (set, created) = ProcessingSteps::ensure_default(sample_id, existing, db::stamp());
        if !created {
            debug!(sample_id = %sample_id, "Default steps already present");
            return Ok(set.into_steps());
        }

        step_rows::insert_steps_if_absent(&self.pool, set.steps()).await?;
        info!(sample_id = %sample_id, "Default processing steps created");

        // Re-read: a concurrent caller may have inserted its own set first
        Ok(step_rows::fetch_steps(&self.pool, sample_id).await?)
    }

    async fn get_processing_steps(&self, sample_id: SampleId) -> StoreResult<Vec<ProcessingStep>> {
        if !samples::sample_exists(&self.pool, sample_id).await? {
            return Err(Self::sample_not_found(sample_id));
        }
        Ok(step_rows::fetch_steps(&self.pool, sample_id).await?)
    }

    async fn start_processing_step(
        &self,
        step_id: StepId,
        assigned_to: Option<String>,
    ) -> StoreResult<ProcessingStep> {
        self.transition(step_id, move |step, now| steps::start(step, assigned_to, now))
            .await
    }

    async fn complete_processing_step(
        &self,
        step_id: StepId,
        notes: Option<String>,
        results_data: Option<serde_json::Value>,
    ) -> StoreResult<ProcessingStep> {
        self.transition(step_id, move |step, now| {
            steps::complete(step, notes, results_data, now)
        })
        .await
    }

    async fn fail_processing_step(
        &self,
        step_id: StepId,
        notes: Option<String>,
    ) -> StoreResult<ProcessingStep> {
        self.transition(step_id, move |step, now| steps::fail(step, notes, now))
            .await
    }

    async fn skip_processing_step(
        &self,
        step_id: StepId,
        notes: Option<String>,
    ) -> StoreResult<ProcessingStep> {
        self.transition(step_id, move |step, now| steps::skip(step, notes, now))
            .await
    }

    async fn update_processing_step(
        &self,
        step_id: StepId,
        patch: &StepPatch,
    ) -> StoreResult<ProcessingStep> {
        step_rows::patch_step(&self.pool, step_id, patch, db::stamp())
            .await?
            .ok_or_else(|| Self::step_not_found(step_id))
    }

    async fn sample_statistics(&self) -> StoreResult<SampleStatistics> {
        Ok(samples::statistics(&self.pool).await?)
    }
}
