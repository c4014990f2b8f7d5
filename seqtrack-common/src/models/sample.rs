//! Sample model and sample-level requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::StepName;

/// Opaque sample identifier
pub type SampleId = Uuid;

/// Coarse lifecycle phase of a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    Submitted,
    Prep,
    Sequencing,
    Analysis,
    Completed,
    /// Reachable only through an explicit operator choice, never by advancing
    Failed,
    Archived,
}

string_enum!(SampleStatus {
    Submitted => "submitted",
    Prep => "prep",
    Sequencing => "sequencing",
    Analysis => "analysis",
    Completed => "completed",
    Failed => "failed",
    Archived => "archived",
});

impl SampleStatus {
    pub const ALL: [SampleStatus; 7] = [
        SampleStatus::Submitted,
        SampleStatus::Prep,
        SampleStatus::Sequencing,
        SampleStatus::Analysis,
        SampleStatus::Completed,
        SampleStatus::Failed,
        SampleStatus::Archived,
    ];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

string_enum!(Priority {
    Low => "low",
    Normal => "normal",
    High => "high",
    Urgent => "urgent",
});

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Urgent,
    ];
}

/// A laboratory specimen tracked through the sequencing workflow
///
/// `status` and `workflow_stage` are independent axes: nothing couples the
/// coarse lifecycle phase to the fine-grained step pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    pub name: String,
    pub status: SampleStatus,
    pub priority: Priority,
    pub workflow_stage: Option<StepName>,
    pub assigned_to: Option<String>,
    pub library_prep_by: Option<String>,
    pub lab_name: Option<String>,
    pub submitter_name: Option<String>,
    pub submitter_email: Option<String>,
    pub notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sample {
    /// Build a freshly submitted sample from creation fields
    pub fn from_new(fields: NewSample, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: fields.name,
            status: fields.status.unwrap_or(SampleStatus::Submitted),
            priority: fields.priority.unwrap_or_default(),
            workflow_stage: fields.workflow_stage,
            assigned_to: fields.assigned_to,
            library_prep_by: None,
            lab_name: fields.lab_name,
            submitter_name: fields.submitter_name,
            submitter_email: fields.submitter_email,
            notes: fields.notes,
            submitted_at: fields.submitted_at.unwrap_or(now),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields accepted when creating a sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSample {
    pub name: String,
    #[serde(default)]
    pub status: Option<SampleStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub workflow_stage: Option<StepName>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub lab_name: Option<String>,
    #[serde(default)]
    pub submitter_name: Option<String>,
    #[serde(default)]
    pub submitter_email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Partial update of a sample; only `Some` fields are written
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SampleStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_stage: Option<StepName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_prep_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SamplePatch {
    pub fn status(status: SampleStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == SamplePatch::default()
    }

    /// Write every provided field into `sample` and stamp `updated_at`
    pub fn apply(&self, sample: &mut Sample, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            sample.name = name.clone();
        }
        if let Some(status) = self.status {
            sample.status = status;
        }
        if let Some(priority) = self.priority {
            sample.priority = priority;
        }
        if let Some(stage) = self.workflow_stage {
            sample.workflow_stage = Some(stage);
        }
        if let Some(assigned_to) = &self.assigned_to {
            sample.assigned_to = Some(assigned_to.clone());
        }
        if let Some(library_prep_by) = &self.library_prep_by {
            sample.library_prep_by = Some(library_prep_by.clone());
        }
        if let Some(lab_name) = &self.lab_name {
            sample.lab_name = Some(lab_name.clone());
        }
        if let Some(submitter_name) = &self.submitter_name {
            sample.submitter_name = Some(submitter_name.clone());
        }
        if let Some(submitter_email) = &self.submitter_email {
            sample.submitter_email = Some(submitter_email.clone());
        }
        if let Some(notes) = &self.notes {
            sample.notes = Some(notes.clone());
        }
        sample.updated_at = now;
    }
}

/// Operator assignment for a sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignRequest {
    pub assigned_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_prep_by: Option<String>,
}

impl AssignRequest {
    pub fn patch(&self) -> SamplePatch {
        SamplePatch {
            assigned_to: Some(self.assigned_to.clone()),
            library_prep_by: self.library_prep_by.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: SampleStatus,
}

/// Listing filter; `limit` defaults to 100
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SampleStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl SampleFilter {
    pub const DEFAULT_LIMIT: u32 = 100;

    pub fn matches(&self, sample: &Sample) -> bool {
        self.status.map_or(true, |s| sample.status == s)
            && self.priority.map_or(true, |p| sample.priority == p)
            && self
                .assigned_to
                .as_deref()
                .map_or(true, |who| sample.assigned_to.as_deref() == Some(who))
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }
}

/// Aggregate counts over all samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleStatistics {
    pub total_samples: u64,
    pub status_breakdown: BTreeMap<String, u64>,
    pub priority_breakdown: BTreeMap<String, u64>,
    /// Mean fraction of completed processing steps across samples that have steps
    pub mean_step_progress: f64,
}
