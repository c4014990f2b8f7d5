//! Sample client facade
//!
//! Routes every edit through a `CacheSynchronizer`: samples are cached by id,
//! processing steps are cached as one ordered list per sample. Step
//! transitions are checked locally against the cached list before anything
//! is sent.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use seqtrack_common::config::TomlConfig;
use seqtrack_common::models::{
    AssignRequest, BatchReport, BulkOperationRequest, NewSample, ProcessingStep, Sample,
    SampleFilter, SampleId, SamplePatch, SampleStatistics, SampleStatus, StepId, StepPatch,
};
use seqtrack_common::status::next_status;
use seqtrack_common::steps::{self, ProcessingSteps};
use seqtrack_common::{time, Error, Result, SampleStore, StateError, StoreResult};

use crate::coordinator::BulkOperationCoordinator;
use crate::http::HttpSampleStore;
use crate::sync::CacheSynchronizer;

/// Cached, optimistic front end over a `SampleStore`
pub struct SampleClient {
    store: Arc<dyn SampleStore>,
    samples: Arc<CacheSynchronizer<Sample>>,
    steps: CacheSynchronizer<Vec<ProcessingStep>>,
    coordinator: BulkOperationCoordinator,
}

impl SampleClient {
    pub fn new(store: Arc<dyn SampleStore>) -> Self {
        let samples = Arc::new(CacheSynchronizer::default());
        let coordinator = BulkOperationCoordinator::new(store.clone(), samples.clone());
        Self {
            store,
            samples,
            steps: CacheSynchronizer::default(),
            coordinator,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.coordinator = self.coordinator.with_max_concurrency(max_concurrency);
        self
    }

    /// Client for the service at `[client] server_url`
    pub fn connect(config: &TomlConfig) -> Result<Self> {
        let store = HttpSampleStore::new(config.client.server_url.clone())?;
        info!(server_url = %store.base_url(), "Sample client configured");
        Ok(Self::new(Arc::new(store)).with_max_concurrency(config.bulk.effective_concurrency()))
    }

    pub fn store(&self) -> &Arc<dyn SampleStore> {
        &self.store
    }

    pub fn samples(&self) -> &CacheSynchronizer<Sample> {
        &self.samples
    }

    pub fn steps(&self) -> &CacheSynchronizer<Vec<ProcessingStep>> {
        &self.steps
    }

    pub fn coordinator(&self) -> &BulkOperationCoordinator {
        &self.coordinator
    }

    pub async fn cached_sample(&self, id: SampleId) -> Option<Sample> {
        self.samples.get(id).await
    }

    pub async fn cached_steps(&self, sample_id: SampleId) -> Option<Vec<ProcessingStep>> {
        self.steps.get(sample_id).await
    }

    /// Fraction of completed steps, computed from the cached list on every call
    pub async fn progress(&self, sample_id: SampleId) -> Option<f64> {
        self.steps
            .get(sample_id)
            .await
            .map(|list| steps::progress(&list))
    }

    // ========================================================================
    // Hydration
    // ========================================================================

    pub async fn load_samples(&self, filter: &SampleFilter) -> Result<Vec<Sample>> {
        let samples = self.store.list_samples(filter).await?;
        self.samples
            .hydrate(samples.iter().map(|s| (s.id, s.clone())))
            .await;
        Ok(samples)
    }

    pub async fn load_sample(&self, id: SampleId) -> Result<Sample> {
        let sample = self.store.get_sample(id).await?;
        self.samples.hydrate([(id, sample.clone())]).await;
        Ok(sample)
    }

    pub async fn load_steps(&self, sample_id: SampleId) -> Result<Vec<ProcessingStep>> {
        let list = self.store.get_processing_steps(sample_id).await?;
        self.steps.hydrate([(sample_id, list.clone())]).await;
        Ok(list)
    }

    /// Evict a sample and its steps from the cache
    pub async fn invalidate(&self, id: SampleId) {
        self.samples.invalidate(id).await;
        self.steps.invalidate(id).await;
    }

    // ========================================================================
    // Sample operations
    // ========================================================================

    /// Create a sample, then its default processing steps
    ///
    /// The sample is cached only after the server confirms it. Step creation
    /// is best effort: a failure is logged and the sample is kept.
    pub async fn create_sample(&self, fields: NewSample) -> Result<Sample> {
        if fields.name.trim().is_empty() {
            return Err(Error::validation("name", "must not be blank"));
        }

        let sample = self.store.create_sample(fields).await?;
        self.samples.hydrate([(sample.id, sample.clone())]).await;
        info!(sample_id = %sample.id, name = %sample.name, "Sample created");

        match self.store.create_default_steps(sample.id).await {
            Ok(list) => {
                self.steps.hydrate([(sample.id, list)]).await;
            }
            Err(e) => {
                warn!(sample_id = %sample.id, error = %e, "Default processing steps not created");
            }
        }

        Ok(sample)
    }

    pub async fn update_sample(&self, id: SampleId, patch: SamplePatch) -> Result<Sample> {
        self.samples
            .mutate(
                id,
                |sample| patch.apply(sample, time::now()),
                self.store.update_sample(id, &patch),
            )
            .await
    }

    pub async fn assign_sample(&self, id: SampleId, assignment: AssignRequest) -> Result<Sample> {
        if assignment.assigned_to.trim().is_empty() {
            return Err(Error::validation("assigned_to", "must not be blank"));
        }

        let patch = assignment.patch();
        self.samples
            .mutate(
                id,
                |sample| patch.apply(sample, time::now()),
                self.store.assign_sample(id, &assignment),
            )
            .await
    }

    pub async fn update_status(&self, id: SampleId, status: SampleStatus) -> Result<Sample> {
        let patch = SamplePatch::status(status);
        self.samples
            .mutate(
                id,
                |sample| patch.apply(sample, time::now()),
                self.store.update_sample_status(id, status),
            )
            .await
    }

    /// Quick advance to the next workflow status
    ///
    /// Returns `Ok(None)` without contacting the server when the sample is
    /// archived or failed. An uncached sample is loaded first.
    pub async fn advance_status(&self, id: SampleId) -> Result<Option<Sample>> {
        let current = match self.samples.get(id).await {
            Some(sample) => sample,
            None => self.load_sample(id).await?,
        };

        match next_status(Some(current.status)) {
            Some(next) => self.update_status(id, next).await.map(Some),
            None => {
                debug!(sample_id = %id, status = %current.status, "No next status");
                Ok(None)
            }
        }
    }

    /// Delete a sample; the cached entry is restored if the server refuses
    pub async fn delete_sample(&self, id: SampleId) -> Result<()> {
        self.samples.remove(id, self.store.delete_sample(id)).await?;
        self.steps.invalidate(id).await;
        info!(sample_id = %id, "Sample deleted");
        Ok(())
    }

    pub async fn bulk(&self, request: &BulkOperationRequest) -> Result<BatchReport> {
        self.coordinator.execute(request).await
    }

    pub async fn advance_all(&self, ids: impl IntoIterator<Item = SampleId>) -> BatchReport {
        self.coordinator.advance(ids).await
    }

    pub async fn statistics(&self) -> Result<SampleStatistics> {
        Ok(self.store.sample_statistics().await?)
    }

    // ========================================================================
    // Processing steps
    // ========================================================================

    pub async fn start_step(
        &self,
        sample_id: SampleId,
        step_id: StepId,
        assigned_to: Option<String>,
    ) -> Result<ProcessingStep> {
        self.transition_step(
            sample_id,
            step_id,
            |set, now| set.start(step_id, assigned_to.clone(), now).map(|_| ()),
            self.store.start_processing_step(step_id, assigned_to.clone()),
        )
        .await
    }

    pub async fn complete_step(
        &self,
        sample_id: SampleId,
        step_id: StepId,
        notes: Option<String>,
        results_data: Option<serde_json::Value>,
    ) -> Result<ProcessingStep> {
        self.transition_step(
            sample_id,
            step_id,
            |set, now| {
                set.complete(step_id, notes.clone(), results_data.clone(), now)
                    .map(|_| ())
            },
            self.store
                .complete_processing_step(step_id, notes.clone(), results_data.clone()),
        )
        .await
    }

    pub async fn fail_step(
        &self,
        sample_id: SampleId,
        step_id: StepId,
        notes: Option<String>,
    ) -> Result<ProcessingStep> {
        self.transition_step(
            sample_id,
            step_id,
            |set, now| set.fail(step_id, notes.clone(), now).map(|_| ()),
            self.store.fail_processing_step(step_id, notes.clone()),
        )
        .await
    }

    pub async fn skip_step(
        &self,
        sample_id: SampleId,
        step_id: StepId,
        notes: Option<String>,
    ) -> Result<ProcessingStep> {
        self.transition_step(
            sample_id,
            step_id,
            |set, now| set.skip(step_id, notes.clone(), now).map(|_| ()),
            self.store.skip_processing_step(step_id, notes.clone()),
        )
        .await
    }

    /// Annotate a step; allowed in any state
    pub async fn update_step(
        &self,
        sample_id: SampleId,
        step_id: StepId,
        patch: StepPatch,
    ) -> Result<ProcessingStep> {
        self.transition_step(
            sample_id,
            step_id,
            |set, now| set.update(step_id, &patch, now).map(|_| ()),
            self.store.update_processing_step(step_id, &patch),
        )
        .await
    }

    async fn ensure_steps(&self, sample_id: SampleId) -> Result<Vec<ProcessingStep>> {
        match self.steps.get(sample_id).await {
            Some(list) => Ok(list),
            None => self.load_steps(sample_id).await,
        }
    }

    /// Check `local` against the cached list, then send the change
    /// optimistically; the step returned by the server replaces the cached one
    ///
    /// A failure restores only `step_id` from the snapshot, so commits on
    /// sibling steps that settled in the meantime are kept.
    async fn transition_step<L, Fut>(
        &self,
        sample_id: SampleId,
        step_id: StepId,
        local: L,
        send: Fut,
    ) -> Result<ProcessingStep>
    where
        L: Fn(&mut ProcessingSteps, DateTime<Utc>) -> std::result::Result<(), StateError>,
        Fut: std::future::Future<Output = StoreResult<ProcessingStep>>,
    {
        let current = self.ensure_steps(sample_id).await?;
        let mut preview = ProcessingSteps::from_steps(sample_id, current);
        local(&mut preview, time::now())?;

        self.steps
            .mutate_scoped(
                sample_id,
                |cached| {
                    let mut set = ProcessingSteps::from_steps(sample_id, std::mem::take(cached));
                    if let Err(e) = local(&mut set, time::now()) {
                        debug!(sample_id = %sample_id, error = %e, "Optimistic step write skipped");
                    }
                    *cached = set.into_steps();
                },
                send,
                |cached, step| cached.map(|list| replace_step(list, step)),
                |cached, snapshot| match cached {
                    Some(list) => Some(restore_step(list, snapshot.as_deref(), step_id)),
                    None => snapshot,
                },
            )
            .await
    }
}

fn replace_step(mut list: Vec<ProcessingStep>, step: &ProcessingStep) -> Vec<ProcessingStep> {
    match list.iter_mut().find(|s| s.id == step.id) {
        Some(slot) => *slot = step.clone(),
        None => {
            list.push(step.clone());
            list.sort_by_key(|s| s.step_order);
        }
    }
    list
}

/// Put the snapshot's copy of `step_id` back into `list`, leaving the rest
fn restore_step(
    list: Vec<ProcessingStep>,
    snapshot: Option<&[ProcessingStep]>,
    step_id: StepId,
) -> Vec<ProcessingStep> {
    match snapshot.and_then(|prev| prev.iter().find(|s| s.id == step_id)) {
        Some(prev) => replace_step(list, prev),
        None => list,
    }
}
