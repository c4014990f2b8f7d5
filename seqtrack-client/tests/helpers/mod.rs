//! In-memory `SampleStore` test double
//!
//! Supports failure injection per entity id, gates that hold a call until the
//! test releases it, and in-flight accounting for concurrency checks.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

use seqtrack_common::bulk;
use seqtrack_common::models::{
    AssignRequest, BatchReport, BulkOperationRequest, NewSample, Priority, ProcessingStep, Sample,
    SampleFilter, SampleId, SamplePatch, SampleStatistics, SampleStatus, StepId, StepPatch,
};
use seqtrack_common::steps::{self, ProcessingSteps};
use seqtrack_common::{time, MutationError, SampleStore, StateError, StoreResult};

#[derive(Default)]
struct MockState {
    samples: HashMap<SampleId, Sample>,
    steps: HashMap<SampleId, Vec<ProcessingStep>>,
    failures: HashMap<Uuid, MutationError>,
    fail_default_steps: bool,
}

#[derive(Default)]
pub struct MockSampleStore {
    state: Mutex<MockState>,
    gates: Mutex<HashMap<Uuid, Arc<Notify>>>,
    mutations: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl MockSampleStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, name: &str, status: SampleStatus) -> Sample {
        let sample = Sample::from_new(
            NewSample {
                name: name.to_string(),
                status: Some(status),
                ..Default::default()
            },
            time::now(),
        );
        let mut state = self.state.lock().unwrap();
        state.samples.insert(sample.id, sample.clone());
        sample
    }

    pub fn seed_steps(&self, sample_id: SampleId) -> Vec<ProcessingStep> {
        let list = ProcessingSteps::create_default(sample_id, time::now()).into_steps();
        let mut state = self.state.lock().unwrap();
        state.steps.insert(sample_id, list.clone());
        list
    }

    /// Every later call touching `id` (sample or step) fails with `error`
    pub fn fail_on(&self, id: Uuid, error: MutationError) {
        self.state.lock().unwrap().failures.insert(id, error);
    }

    pub fn clear_failure(&self, id: Uuid) {
        self.state.lock().unwrap().failures.remove(&id);
    }

    pub fn fail_default_steps(&self) {
        self.state.lock().unwrap().fail_default_steps = true;
    }

    /// Calls touching `id` wait until the returned `Notify` is signalled
    pub fn gate(&self, id: Uuid) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(id, notify.clone());
        notify
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Number of mutating calls received
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn stored(&self, id: SampleId) -> Option<Sample> {
        self.state.lock().unwrap().samples.get(&id).cloned()
    }

    pub fn stored_steps(&self, sample_id: SampleId) -> Vec<ProcessingStep> {
        self.state
            .lock()
            .unwrap()
            .steps
            .get(&sample_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Count the call, honor gates and delays, then report any injected failure
    async fn enter(&self, id: Uuid) -> StoreResult<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        let gate = self.gates.lock().unwrap().get(&id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match self.state.lock().unwrap().failures.get(&id) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn patch(&self, id: SampleId, patch: &SamplePatch) -> StoreResult<Sample> {
        self.enter(id).await?;
        let mut state = self.state.lock().unwrap();
        let sample = state
            .samples
            .get_mut(&id)
            .ok_or_else(|| MutationError::NotFound(format!("sample {} not found", id)))?;
        patch.apply(sample, time::now());
        Ok(sample.clone())
    }

    async fn step_transition(
        &self,
        step_id: StepId,
        transition: impl FnOnce(&mut ProcessingStep) -> Result<(), StateError>,
    ) -> StoreResult<ProcessingStep> {
        self.enter(step_id).await?;
        let mut state = self.state.lock().unwrap();
        let step = state
            .steps
            .values_mut()
            .flat_map(|list| list.iter_mut())
            .find(|s| s.id == step_id)
            .ok_or_else(|| MutationError::NotFound(format!("step {} not found", step_id)))?;
        transition(step).map_err(|e| MutationError::Conflict(e.to_string()))?;
        Ok(step.clone())
    }
}

#[async_trait::async_trait]
impl SampleStore for MockSampleStore {
    async fn create_sample(&self, fields: NewSample) -> StoreResult<Sample> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let sample = Sample::from_new(fields, time::now());
        self.state
            .lock()
            .unwrap()
            .samples
            .insert(sample.id, sample.clone());
        Ok(sample)
    }

    async fn get_sample(&self, id: SampleId) -> StoreResult<Sample> {
        self.stored(id)
            .ok_or_else(|| MutationError::NotFound(format!("sample {} not found", id)))
    }

    async fn list_samples(&self, filter: &SampleFilter) -> StoreResult<Vec<Sample>> {
        let state = self.state.lock().unwrap();
        let mut samples: Vec<Sample> = state
            .samples
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        samples.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(samples
            .into_iter()
            .skip(filter.skip.unwrap_or(0) as usize)
            .take(filter.effective_limit() as usize)
            .collect())
    }

    async fn update_sample(&self, id: SampleId, patch: &SamplePatch) -> StoreResult<Sample> {
        self.patch(id, patch).await
    }

    async fn assign_sample(
        &self,
        id: SampleId,
        assignment: &AssignRequest,
    ) -> StoreResult<Sample> {
        self.patch(id, &assignment.patch()).await
    }

    async fn delete_sample(&self, id: SampleId) -> StoreResult<()> {
        self.enter(id).await?;
        let mut state = self.state.lock().unwrap();
        state.steps.remove(&id);
        state
            .samples
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| MutationError::NotFound(format!("sample {} not found", id)))
    }

    async fn update_sample_status(
        &self,
        id: SampleId,
        status: SampleStatus,
    ) -> StoreResult<Sample> {
        self.patch(id, &SamplePatch::status(status)).await
    }

    async fn bulk_apply(&self, request: &BulkOperationRequest) -> seqtrack_common::Result<BatchReport> {
        let validated = bulk::validate(request)?;
        let patch = validated.patch();
        Ok(bulk::dispatch(validated.target_ids, 4, |id| self.update_sample(id, &patch)).await)
    }

    async fn create_default_steps(&self, sample_id: SampleId) -> StoreResult<Vec<ProcessingStep>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_default_steps {
            return Err(MutationError::Server("step table unavailable".into()));
        }
        if !state.samples.contains_key(&sample_id) {
            return Err(MutationError::NotFound(format!("sample {} not found", sample_id)));
        }
        let existing = state.steps.remove(&sample_id).unwrap_or_default();
        let (set, _) = ProcessingSteps::ensure_default(sample_id, existing, time::now());
        let list = set.into_steps();
        state.steps.insert(sample_id, list.clone());
        Ok(list)
    }

    async fn get_processing_steps(
        &self,
        sample_id: SampleId,
    ) -> StoreResult<Vec<ProcessingStep>> {
        if self.stored(sample_id).is_none() {
            return Err(MutationError::NotFound(format!("sample {} not found", sample_id)));
        }
        Ok(self.stored_steps(sample_id))
    }

    async fn start_processing_step(
        &self,
        step_id: StepId,
        assigned_to: Option<String>,
    ) -> StoreResult<ProcessingStep> {
        self.step_transition(step_id, |step| steps::start(step, assigned_to, time::now()))
            .await
    }

    async fn complete_processing_step(
        &self,
        step_id: StepId,
        notes: Option<String>,
        results_data: Option<serde_json::Value>,
    ) -> StoreResult<ProcessingStep> {
        self.step_transition(step_id, |step| {
            steps::complete(step, notes, results_data, time::now())
        })
        .await
    }

    async fn fail_processing_step(
        &self,
        step_id: StepId,
        notes: Option<String>,
    ) -> StoreResult<ProcessingStep> {
        self.step_transition(step_id, |step| steps::fail(step, notes, time::now()))
            .await
    }

    async fn skip_processing_step(
        &self,
        step_id: StepId,
        notes: Option<String>,
    ) -> StoreResult<ProcessingStep> {
        self.step_transition(step_id, |step| steps::skip(step, notes, time::now()))
            .await
    }

    async fn update_processing_step(
        &self,
        step_id: StepId,
        patch: &StepPatch,
    ) -> StoreResult<ProcessingStep> {
        self.step_transition(step_id, |step| {
            steps::update(step, patch, time::now());
            Ok(())
        })
        .await
    }

    async fn sample_statistics(&self) -> StoreResult<SampleStatistics> {
        let state = self.state.lock().unwrap();
        let mut stats = SampleStatistics {
            total_samples: state.samples.len() as u64,
            ..Default::default()
        };
        for sample in state.samples.values() {
            *stats
                .status_breakdown
                .entry(sample.status.to_string())
                .or_default() += 1;
            *stats
                .priority_breakdown
                .entry(sample.priority.to_string())
                .or_default() += 1;
        }
        Ok(stats)
    }
}

/// A sample patch that only raises priority
pub fn urgent() -> SamplePatch {
    SamplePatch {
        priority: Some(Priority::Urgent),
        ..Default::default()
    }
}
