//! Tracker events and the broadcast EventBus
//!
//! The service emits a `TrackerEvent` after every successful write. Events
//! are serialized with a `type` tag so SSE consumers can filter on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{
    OperationKind, SampleId, SampleStatus, StepId, StepName, StepStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrackerEvent {
    /// New sample persisted
    SampleCreated {
        sample_id: SampleId,
        name: String,
        timestamp: DateTime<Utc>,
    },

    /// Any sample field changed (status, assignment, bulk edit)
    SampleUpdated {
        sample_id: SampleId,
        status: SampleStatus,
        timestamp: DateTime<Utc>,
    },

    /// Sample and its steps removed
    SampleDeleted {
        sample_id: SampleId,
        timestamp: DateTime<Utc>,
    },

    /// Step moved between states
    StepStatusChanged {
        step_id: StepId,
        sample_id: SampleId,
        step_name: StepName,
        old_status: StepStatus,
        new_status: StepStatus,
        timestamp: DateTime<Utc>,
    },

    /// A bulk request finished settling
    BulkOperationCompleted {
        operation_kind: OperationKind,
        succeeded: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },
}

impl TrackerEvent {
    /// Event type as string for filtering and SSE event names
    pub fn event_type(&self) -> &'static str {
        match self {
            TrackerEvent::SampleCreated { .. } => "SampleCreated",
            TrackerEvent::SampleUpdated { .. } => "SampleUpdated",
            TrackerEvent::SampleDeleted { .. } => "SampleDeleted",
            TrackerEvent::StepStatusChanged { .. } => "StepStatusChanged",
            TrackerEvent::BulkOperationCompleted { .. } => "BulkOperationCompleted",
        }
    }
}

/// Broadcast bus for tracker events
///
/// Slow subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TrackerEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TrackerEvent,
    ) -> Result<usize, broadcast::error::SendError<TrackerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TrackerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
