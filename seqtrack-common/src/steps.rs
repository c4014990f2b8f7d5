//! Processing step engine
//!
//! Per-step lifecycle:
//!
//! ```text
//! pending ──start──▶ in_progress ──complete──▶ completed
//!    │                   │
//!    └──fail / skip──────┴──▶ failed | skipped
//! ```
//!
//! Completing one step never advances the next one. Rejected transitions
//! leave the step untouched.

use chrono::{DateTime, Utc};

use crate::error::{StateError, StepTransition};
use crate::models::{
    ProcessingStep, SampleId, StepId, StepName, StepPatch, StepStatus, DEFAULT_STEP_COUNT,
};

fn illegal(
    step: &ProcessingStep,
    transition: StepTransition,
    reason: &'static str,
) -> StateError {
    StateError::IllegalTransition {
        step_id: step.id,
        step_name: step.step_name,
        transition,
        current: step.step_status,
        reason,
    }
}

/// `pending → in_progress`
pub fn start(
    step: &mut ProcessingStep,
    assigned_to: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), StateError> {
    match step.step_status {
        StepStatus::Pending => {}
        StepStatus::InProgress => {
            return Err(illegal(step, StepTransition::Start, "step already started"))
        }
        _ => return Err(illegal(step, StepTransition::Start, "step already finished")),
    }

    step.step_status = StepStatus::InProgress;
    step.started_at = Some(now);
    if assigned_to.is_some() {
        step.assigned_to = assigned_to;
    }
    step.updated_at = now;
    Ok(())
}

/// `in_progress → completed`; records actual duration from `started_at`
pub fn complete(
    step: &mut ProcessingStep,
    notes: Option<String>,
    results_data: Option<serde_json::Value>,
    now: DateTime<Utc>,
) -> Result<(), StateError> {
    match step.step_status {
        StepStatus::InProgress => {}
        StepStatus::Pending => {
            return Err(illegal(step, StepTransition::Complete, "step not started"))
        }
        _ => {
            return Err(illegal(
                step,
                StepTransition::Complete,
                "step already finished",
            ))
        }
    }

    step.step_status = StepStatus::Completed;
    step.completed_at = Some(now);
    step.actual_duration_hours = step
        .started_at
        .map(|started| crate::time::elapsed_hours(started, now));
    merge_notes(step, notes);
    merge_results(step, results_data);
    step.updated_at = now;
    Ok(())
}

/// `pending | in_progress → failed`
pub fn fail(
    step: &mut ProcessingStep,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), StateError> {
    finish_early(step, StepTransition::Fail, StepStatus::Failed, notes, now)
}

/// `pending | in_progress → skipped`
pub fn skip(
    step: &mut ProcessingStep,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), StateError> {
    finish_early(step, StepTransition::Skip, StepStatus::Skipped, notes, now)
}

fn finish_early(
    step: &mut ProcessingStep,
    transition: StepTransition,
    outcome: StepStatus,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), StateError> {
    if step.step_status.is_terminal() {
        return Err(illegal(step, transition, "step already finished"));
    }
    step.step_status = outcome;
    step.completed_at = Some(now);
    merge_notes(step, notes);
    step.updated_at = now;
    Ok(())
}

/// Annotation patch; allowed regardless of step state
pub fn update(step: &mut ProcessingStep, patch: &StepPatch, now: DateTime<Utc>) {
    if let Some(notes) = &patch.notes {
        step.notes = Some(notes.clone());
    }
    if let Some(hours) = patch.estimated_duration_hours {
        step.estimated_duration_hours = Some(hours);
    }
    if let Some(assigned_to) = &patch.assigned_to {
        step.assigned_to = Some(assigned_to.clone());
    }
    step.updated_at = now;
}

/// Appends to existing notes on a new line
fn merge_notes(step: &mut ProcessingStep, notes: Option<String>) {
    let Some(notes) = notes else { return };
    step.notes = match step.notes.take() {
        Some(existing) if !existing.is_empty() => Some(format!("{}\n{}", existing, notes)),
        _ => Some(notes),
    };
}

/// Object payloads merge key by key (new keys win); anything else replaces
fn merge_results(step: &mut ProcessingStep, results: Option<serde_json::Value>) {
    let Some(results) = results else { return };
    match (&mut step.results_data, results) {
        (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(incoming)) => {
            existing.extend(incoming);
        }
        (slot, results) => *slot = Some(results),
    }
}

/// Fraction of completed steps over the canonical step count
///
/// Always computed from the statuses passed in; callers never store it.
pub fn progress(steps: &[ProcessingStep]) -> f64 {
    completed_count(steps) as f64 / DEFAULT_STEP_COUNT as f64
}

pub fn completed_count(steps: &[ProcessingStep]) -> usize {
    steps
        .iter()
        .filter(|s| s.step_status == StepStatus::Completed)
        .count()
}

/// The ordered step set owned by one sample
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingSteps {
    sample_id: SampleId,
    steps: Vec<ProcessingStep>,
}

impl ProcessingSteps {
    /// The 8 canonical steps, all pending, in workflow order
    pub fn create_default(sample_id: SampleId, now: DateTime<Utc>) -> Self {
        let steps = StepName::ALL
            .iter()
            .map(|name| ProcessingStep::pending(sample_id, *name, now))
            .collect();
        Self { sample_id, steps }
    }

    /// Returns the existing set untouched when the sample already has steps,
    /// otherwise creates the default set. The flag reports whether anything was created.
    pub fn ensure_default(
        sample_id: SampleId,
        existing: Vec<ProcessingStep>,
        now: DateTime<Utc>,
    ) -> (Self, bool) {
        if existing.is_empty() {
            (Self::create_default(sample_id, now), true)
        } else {
            (Self::from_steps(sample_id, existing), false)
        }
    }

    /// Wrap steps loaded from storage, restoring positional order
    pub fn from_steps(sample_id: SampleId, mut steps: Vec<ProcessingStep>) -> Self {
        steps.sort_by_key(|s| s.step_order);
        Self { sample_id, steps }
    }

    pub fn sample_id(&self) -> SampleId {
        self.sample_id
    }

    pub fn steps(&self) -> &[ProcessingStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<ProcessingStep> {
        self.steps
    }

    pub fn get(&self, step_id: StepId) -> Option<&ProcessingStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    fn get_mut(&mut self, step_id: StepId) -> Result<&mut ProcessingStep, StateError> {
        self.steps
            .iter_mut()
            .find(|s| s.id == step_id)
            .ok_or(StateError::UnknownStep(step_id))
    }

    pub fn start(
        &mut self,
        step_id: StepId,
        assigned_to: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<&ProcessingStep, StateError> {
        let step = self.get_mut(step_id)?;
        start(step, assigned_to, now)?;
        Ok(&*step)
    }

    pub fn complete(
        &mut self,
        step_id: StepId,
        notes: Option<String>,
        results_data: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<&ProcessingStep, StateError> {
        let step = self.get_mut(step_id)?;
        complete(step, notes, results_data, now)?;
        Ok(&*step)
    }

    pub fn fail(
        &mut self,
        step_id: StepId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<&ProcessingStep, StateError> {
        let step = self.get_mut(step_id)?;
        fail(step, notes, now)?;
        Ok(&*step)
    }

    pub fn skip(
        &mut self,
        step_id: StepId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<&ProcessingStep, StateError> {
        let step = self.get_mut(step_id)?;
        skip(step, notes, now)?;
        Ok(&*step)
    }

    pub fn update(
        &mut self,
        step_id: StepId,
        patch: &StepPatch,
        now: DateTime<Utc>,
    ) -> Result<&ProcessingStep, StateError> {
        let step = self.get_mut(step_id)?;
        update(step, patch, now);
        Ok(&*step)
    }

    pub fn completed_count(&self) -> usize {
        completed_count(&self.steps)
    }

    pub fn progress(&self) -> f64 {
        progress(&self.steps)
    }
}
