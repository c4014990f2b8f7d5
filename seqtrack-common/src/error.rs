//! Common error types for SeqTrack
//!
//! The taxonomy mirrors how failures propagate through the system:
//! - `Validation` and `State` are raised synchronously, before any network call
//! - `Mutation` is collected per item by bulk operations, never escalated
//! - `Sync` marks a rollback that had nothing left to restore

use thiserror::Error;
use uuid::Uuid;

use crate::models::{StepName, StepStatus};

/// Common result type for SeqTrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across SeqTrack crates
#[derive(Error, Debug)]
pub enum Error {
    /// Request payload is missing a required field or is otherwise malformed
    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    /// Illegal processing step transition
    #[error(transparent)]
    State(#[from] StateError),

    /// The persistence collaborator rejected or failed a single-item mutation
    #[error(transparent)]
    Mutation(#[from] MutationError),

    /// Rollback could not be applied because the entity left the cache
    #[error("Sync error: {0}")]
    Sync(String),

    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Transition attempted on a processing step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTransition {
    Start,
    Complete,
    Fail,
    Skip,
}

impl StepTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepTransition::Start => "start",
            StepTransition::Complete => "complete",
            StepTransition::Fail => "fail",
            StepTransition::Skip => "skip",
        }
    }
}

impl std::fmt::Display for StepTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Illegal step transition, or a transition on a step that does not exist
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("cannot {transition} step {step_name} ({step_id}): {reason} (current state: {current})")]
    IllegalTransition {
        step_id: Uuid,
        step_name: StepName,
        transition: StepTransition,
        current: StepStatus,
        reason: &'static str,
    },

    #[error("step {0} not found")]
    UnknownStep(Uuid),
}

impl StateError {
    /// Short human-readable reason, e.g. "step already started"
    pub fn reason(&self) -> &'static str {
        match self {
            StateError::IllegalTransition { reason, .. } => reason,
            StateError::UnknownStep(_) => "step not found",
        }
    }
}

/// Single-item failure reported by the persistence collaborator
///
/// Each variant carries a stable `code()` used in `BatchReport` entries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    /// Entity does not exist server-side (404)
    #[error("not found: {0}")]
    NotFound(String),

    /// Request conflicts with current server state (409), e.g. illegal step transition
    #[error("conflict: {0}")]
    Conflict(String),

    /// Request rejected as invalid (400)
    #[error("invalid request: {0}")]
    Invalid(String),

    /// Server failed to apply the mutation (5xx, database failure)
    #[error("server error: {0}")]
    Server(String),

    /// Request never reached the server or the response was unreadable
    #[error("transport error: {0}")]
    Transport(String),
}

impl MutationError {
    pub fn code(&self) -> &'static str {
        match self {
            MutationError::NotFound(_) => "not_found",
            MutationError::Conflict(_) => "conflict",
            MutationError::Invalid(_) => "invalid",
            MutationError::Server(_) => "server_error",
            MutationError::Transport(_) => "transport",
        }
    }
}

impl From<Error> for MutationError {
    fn from(err: Error) -> Self {
        match err {
            Error::Mutation(inner) => inner,
            Error::NotFound(msg) => MutationError::NotFound(msg),
            Error::State(state) => MutationError::Conflict(state.to_string()),
            Error::Validation { .. } => MutationError::Invalid(err.to_string()),
            other => MutationError::Server(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_error_codes_are_stable() {
        assert_eq!(MutationError::NotFound("x".into()).code(), "not_found");
        assert_eq!(MutationError::Conflict("x".into()).code(), "conflict");
        assert_eq!(MutationError::Invalid("x".into()).code(), "invalid");
        assert_eq!(MutationError::Server("x".into()).code(), "server_error");
        assert_eq!(MutationError::Transport("x".into()).code(), "transport");
    }

    #[test]
    fn test_not_found_maps_to_not_found_mutation() {
        let err: MutationError = Error::NotFound("sample abc".into()).into();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn test_state_error_maps_to_conflict() {
        let state = StateError::IllegalTransition {
            step_id: Uuid::nil(),
            step_name: StepName::SampleQc,
            transition: StepTransition::Start,
            current: StepStatus::InProgress,
            reason: "step already started",
        };
        let err: MutationError = Error::State(state).into();
        assert_eq!(err.code(), "conflict");
        assert!(err.to_string().contains("step already started"));
    }
}
