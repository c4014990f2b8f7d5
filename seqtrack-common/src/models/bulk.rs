//! Bulk operation wire types
//!
//! The request payload is a loose record on the wire. It is turned into a
//! typed `crate::bulk::BulkOperation` by `crate::bulk::validate` before any
//! mutation is dispatched.

use serde::{Deserialize, Serialize};

use super::{Priority, SampleId, SampleStatus, StepName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    UpdateStatus,
    UpdatePriority,
    UpdateWorkflowStage,
    AssignLab,
    BatchProcess,
}

string_enum!(OperationKind {
    UpdateStatus => "update_status",
    UpdatePriority => "update_priority",
    UpdateWorkflowStage => "update_workflow_stage",
    AssignLab => "assign_lab",
    BatchProcess => "batch_process",
});

/// Untyped payload; which fields are required depends on the operation kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SampleStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_stage: Option<StepName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOperationRequest {
    pub operation_kind: OperationKind,
    pub target_ids: Vec<SampleId>,
    #[serde(default)]
    pub payload: BulkPayload,
}

impl BulkOperationRequest {
    pub fn new(
        operation_kind: OperationKind,
        target_ids: impl IntoIterator<Item = SampleId>,
        payload: BulkPayload,
    ) -> Self {
        Self {
            operation_kind,
            target_ids: target_ids.into_iter().collect(),
            payload,
        }
    }
}

/// Per-item failure within a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedItem {
    pub id: SampleId,
    /// Stable machine-readable code, e.g. "not_found"
    pub error: String,
    pub message: String,
}

/// Aggregated outcome of a bulk operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded_ids: Vec<SampleId>,
    pub failed: Vec<FailedItem>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded_ids.len() + self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<SampleId> {
        self.failed.iter().map(|f| f.id).collect()
    }

    /// Operator-facing summary: "K of N updated, M failed: reasons..."
    pub fn summary(&self) -> String {
        let mut text = format!(
            "{} of {} updated, {} failed",
            self.succeeded_ids.len(),
            self.total(),
            self.failed.len()
        );
        if !self.failed.is_empty() {
            let reasons: Vec<String> = self
                .failed
                .iter()
                .map(|f| format!("{} ({})", f.id, f.error))
                .collect();
            text.push_str(": ");
            text.push_str(&reasons.join(", "));
        }
        text
    }
}
