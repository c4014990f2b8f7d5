//! Bulk operation validation and fan-out
//!
//! `validate` turns a loosely shaped `BulkOperationRequest` into a typed
//! `ValidatedBulk`, rejecting the whole batch before anything is dispatched.
//! `dispatch` runs one mutation per target through a bounded worker pool and
//! folds every settlement into a `BatchReport`; a failing item never cancels
//! or short-circuits its siblings.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::future::Future;
use tracing::debug;

use crate::error::{Error, MutationError, Result};
use crate::models::{
    BatchReport, BulkOperationRequest, FailedItem, OperationKind, Priority, SampleId,
    SamplePatch, SampleStatus, StepName,
};

/// Default number of per-sample mutations in flight at once
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct AssignLab {
    pub lab_name: String,
    pub submitter_name: Option<String>,
    pub submitter_email: Option<String>,
}

/// Any subset of the batch-editable fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchProcess {
    pub status: Option<SampleStatus>,
    pub priority: Option<Priority>,
    pub workflow_stage: Option<StepName>,
    pub lab_name: Option<String>,
    pub submitter_name: Option<String>,
    pub submitter_email: Option<String>,
}

/// Typed bulk operation, one variant per operation kind
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    UpdateStatus { status: SampleStatus },
    UpdatePriority { priority: Priority },
    UpdateWorkflowStage { workflow_stage: StepName },
    AssignLab(AssignLab),
    BatchProcess(BatchProcess),
}

impl BulkOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            BulkOperation::UpdateStatus { .. } => OperationKind::UpdateStatus,
            BulkOperation::UpdatePriority { .. } => OperationKind::UpdatePriority,
            BulkOperation::UpdateWorkflowStage { .. } => OperationKind::UpdateWorkflowStage,
            BulkOperation::AssignLab(_) => OperationKind::AssignLab,
            BulkOperation::BatchProcess(_) => OperationKind::BatchProcess,
        }
    }
}

/// A bulk request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBulk {
    pub operation: BulkOperation,
    /// Deduplicated, in first-seen order
    pub target_ids: Vec<SampleId>,
    pub batch_notes: Option<String>,
}

impl ValidatedBulk {
    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    /// The single-sample mutation applied to every target
    pub fn patch(&self) -> SamplePatch {
        let mut patch = match &self.operation {
            BulkOperation::UpdateStatus { status } => SamplePatch {
                status: Some(*status),
                ..Default::default()
            },
            BulkOperation::UpdatePriority { priority } => SamplePatch {
                priority: Some(*priority),
                ..Default::default()
            },
            BulkOperation::UpdateWorkflowStage { workflow_stage } => SamplePatch {
                workflow_stage: Some(*workflow_stage),
                ..Default::default()
            },
            BulkOperation::AssignLab(assign) => SamplePatch {
                lab_name: Some(assign.lab_name.clone()),
                submitter_name: assign.submitter_name.clone(),
                submitter_email: assign.submitter_email.clone(),
                ..Default::default()
            },
            BulkOperation::BatchProcess(batch) => SamplePatch {
                status: batch.status,
                priority: batch.priority,
                workflow_stage: batch.workflow_stage,
                lab_name: batch.lab_name.clone(),
                submitter_name: batch.submitter_name.clone(),
                submitter_email: batch.submitter_email.clone(),
                ..Default::default()
            },
        };
        patch.notes = self.batch_notes.clone();
        patch
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required<T>(value: Option<T>, kind: OperationKind, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::validation(field, format!("required for {}", kind)))
}

/// Check the payload against the requirements of its operation kind
pub fn validate(request: &BulkOperationRequest) -> Result<ValidatedBulk> {
    let mut seen = HashSet::new();
    let target_ids: Vec<SampleId> = request
        .target_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();
    if target_ids.is_empty() {
        return Err(Error::validation("target_ids", "at least one sample is required"));
    }

    let payload = &request.payload;
    let kind = request.operation_kind;
    let operation = match kind {
        OperationKind::UpdateStatus => BulkOperation::UpdateStatus {
            status: required(payload.status, kind, "status")?,
        },
        OperationKind::UpdatePriority => BulkOperation::UpdatePriority {
            priority: required(payload.priority, kind, "priority")?,
        },
        OperationKind::UpdateWorkflowStage => BulkOperation::UpdateWorkflowStage {
            workflow_stage: required(payload.workflow_stage, kind, "workflow_stage")?,
        },
        OperationKind::AssignLab => BulkOperation::AssignLab(AssignLab {
            lab_name: required(non_blank(&payload.lab_name), kind, "lab_name")?,
            submitter_name: non_blank(&payload.submitter_name),
            submitter_email: non_blank(&payload.submitter_email),
        }),
        OperationKind::BatchProcess => BulkOperation::BatchProcess(BatchProcess {
            status: payload.status,
            priority: payload.priority,
            workflow_stage: payload.workflow_stage,
            lab_name: non_blank(&payload.lab_name),
            submitter_name: non_blank(&payload.submitter_name),
            submitter_email: non_blank(&payload.submitter_email),
        }),
    };

    let validated = ValidatedBulk {
        operation,
        target_ids,
        batch_notes: non_blank(&payload.batch_notes),
    };

    if validated.patch().is_empty() {
        return Err(Error::validation("payload", "batch_process requires at least one field"));
    }

    Ok(validated)
}

/// Run `mutate` once per id with at most `max_concurrency` in flight, wait for
/// every item to settle, and aggregate the outcomes
pub async fn dispatch<F, Fut, T>(
    ids: impl IntoIterator<Item = SampleId>,
    max_concurrency: usize,
    mutate: F,
) -> BatchReport
where
    F: Fn(SampleId) -> Fut,
    Fut: Future<Output = std::result::Result<T, MutationError>>,
{
    let outcomes: Vec<(SampleId, std::result::Result<T, MutationError>)> = stream::iter(ids)
        .map(|id| {
            let fut = mutate(id);
            async move { (id, fut.await) }
        })
        .buffer_unordered(max_concurrency.max(1))
        .collect()
        .await;

    let mut report = BatchReport::default();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(_) => report.succeeded_ids.push(id),
            Err(e) => {
                debug!(sample_id = %id, code = e.code(), error = %e, "Bulk item failed");
                report.failed.push(FailedItem {
                    id,
                    error: e.code().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
    report
}
