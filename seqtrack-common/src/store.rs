//! Persistence collaborator interface
//!
//! Both the SQLite service and the HTTP client implement `SampleStore`, so the
//! client-side synchronizer and coordinator can run against either one (or
//! an in-memory test double).

use crate::error::MutationError;
use crate::models::{
    AssignRequest, BatchReport, BulkOperationRequest, NewSample, ProcessingStep, Sample,
    SampleFilter, SampleId, SamplePatch, SampleStatistics, SampleStatus, StepId, StepPatch,
};

/// Result of a single-item store call
pub type StoreResult<T> = std::result::Result<T, MutationError>;

/// Authoritative sample and processing step storage
///
/// Every call except `create_sample` is safe to retry. `create_default_steps`
/// is retry-safe because it returns the existing set when one is present.
#[async_trait::async_trait]
pub trait SampleStore: Send + Sync {
    async fn create_sample(&self, fields: NewSample) -> StoreResult<Sample>;

    async fn get_sample(&self, id: SampleId) -> StoreResult<Sample>;

    /// Newest first, honoring `skip`/`limit`
    async fn list_samples(&self, filter: &SampleFilter) -> StoreResult<Vec<Sample>>;

    async fn update_sample(&self, id: SampleId, patch: &SamplePatch) -> StoreResult<Sample>;

    async fn assign_sample(&self, id: SampleId, assignment: &AssignRequest)
        -> StoreResult<Sample>;

    /// Removes the sample together with its processing steps
    async fn delete_sample(&self, id: SampleId) -> StoreResult<()>;

    async fn update_sample_status(&self, id: SampleId, status: SampleStatus)
        -> StoreResult<Sample>;

    /// Apply a bulk operation server-side
    ///
    /// # Errors
    /// Returns `Error::Validation` when the request is rejected as a whole.
    /// Per-item failures are reported inside the `BatchReport`.
    async fn bulk_apply(&self, request: &BulkOperationRequest) -> crate::Result<BatchReport>;

    async fn create_default_steps(&self, sample_id: SampleId) -> StoreResult<Vec<ProcessingStep>>;

    async fn get_processing_steps(&self, sample_id: SampleId)
        -> StoreResult<Vec<ProcessingStep>>;

    async fn start_processing_step(
        &self,
        step_id: StepId,
        assigned_to: Option<String>,
    ) -> StoreResult<ProcessingStep>;

    async fn complete_processing_step(
        &self,
        step_id: StepId,
        notes: Option<String>,
        results_data: Option<serde_json::Value>,
    ) -> StoreResult<ProcessingStep>;

    async fn fail_processing_step(
        &self,
        step_id: StepId,
        notes: Option<String>,
    ) -> StoreResult<ProcessingStep>;

    async fn skip_processing_step(
        &self,
        step_id: StepId,
        notes: Option<String>,
    ) -> StoreResult<ProcessingStep>;

    async fn update_processing_step(
        &self,
        step_id: StepId,
        patch: &StepPatch,
    ) -> StoreResult<ProcessingStep>;

    async fn sample_statistics(&self) -> StoreResult<SampleStatistics>;
}
