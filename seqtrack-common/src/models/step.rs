//! Processing step model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SampleId;

pub type StepId = Uuid;

/// Number of processing steps every sample carries
pub const DEFAULT_STEP_COUNT: usize = 8;

/// Canonical processing steps, declared in workflow order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    SampleQc,
    LibraryPrep,
    LibraryQc,
    SequencingSetup,
    SequencingRun,
    Basecalling,
    QualityAssessment,
    DataDelivery,
}

string_enum!(StepName {
    SampleQc => "sample_qc",
    LibraryPrep => "library_prep",
    LibraryQc => "library_qc",
    SequencingSetup => "sequencing_setup",
    SequencingRun => "sequencing_run",
    Basecalling => "basecalling",
    QualityAssessment => "quality_assessment",
    DataDelivery => "data_delivery",
});

impl StepName {
    pub const ALL: [StepName; DEFAULT_STEP_COUNT] = [
        StepName::SampleQc,
        StepName::LibraryPrep,
        StepName::LibraryQc,
        StepName::SequencingSetup,
        StepName::SequencingRun,
        StepName::Basecalling,
        StepName::QualityAssessment,
        StepName::DataDelivery,
    ];

    /// Position in the canonical sequence (0-based)
    pub fn order(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

string_enum!(StepStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Failed => "failed",
    Skipped => "skipped",
});

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

/// One unit of work performed on a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStep {
    pub id: StepId,
    pub sample_id: SampleId,
    pub step_name: StepName,
    /// Array index within the sample's step set
    pub step_order: u32,
    pub step_status: StepStatus,
    pub assigned_to: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_duration_hours: Option<i64>,
    pub actual_duration_hours: Option<f64>,
    pub notes: Option<String>,
    pub results_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingStep {
    pub fn pending(sample_id: SampleId, step_name: StepName, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sample_id,
            step_name,
            step_order: step_name.order() as u32,
            step_status: StepStatus::Pending,
            assigned_to: None,
            started_at: None,
            completed_at: None,
            estimated_duration_hours: None,
            actual_duration_hours: None,
            notes: None,
            results_data: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Free-form annotation patch, allowed in any step state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_hours: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartStepRequest {
    #[serde(default)]
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompleteStepRequest {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub results_data: Option<serde_json::Value>,
}

/// Body for fail/skip transitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepNotesRequest {
    #[serde(default)]
    pub notes: Option<String>,
}
