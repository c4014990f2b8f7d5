//! Sample status progression
//!
//! The forward workflow is a fixed linear sequence. `Failed` sits outside the
//! sequence: operators set it explicitly and it never advances.

use crate::models::SampleStatus;

/// Forward workflow order
pub const WORKFLOW_SEQUENCE: [SampleStatus; 6] = [
    SampleStatus::Submitted,
    SampleStatus::Prep,
    SampleStatus::Sequencing,
    SampleStatus::Analysis,
    SampleStatus::Completed,
    SampleStatus::Archived,
];

/// Status one position later in the workflow, or `None` when `current` is
/// absent, terminal (`Archived`) or outside the sequence (`Failed`)
pub fn next_status(current: Option<SampleStatus>) -> Option<SampleStatus> {
    let current = current?;
    let idx = WORKFLOW_SEQUENCE.iter().position(|s| *s == current)?;
    WORKFLOW_SEQUENCE.get(idx + 1).copied()
}

/// String-input variant for values read from untyped sources.
/// Unknown strings never advance.
pub fn next_status_str(current: &str) -> Option<SampleStatus> {
    next_status(current.parse().ok())
}

/// True when the status has no forward successor
pub fn is_terminal(status: SampleStatus) -> bool {
    next_status(Some(status)).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_never_advance() {
        assert_eq!(next_status(Some(SampleStatus::Archived)), None);
        assert_eq!(next_status(Some(SampleStatus::Failed)), None);
        assert!(is_terminal(SampleStatus::Archived));
        assert!(is_terminal(SampleStatus::Failed));
    }

    #[test]
    fn test_each_status_advances_to_following_element() {
        for pair in WORKFLOW_SEQUENCE.windows(2) {
            assert_eq!(next_status(Some(pair[0])), Some(pair[1]));
        }
    }

    #[test]
    fn test_absent_status_has_no_next() {
        assert_eq!(next_status(None), None);
    }

    #[test]
    fn test_failed_is_never_returned() {
        for status in SampleStatus::ALL {
            assert_ne!(next_status(Some(status)), Some(SampleStatus::Failed));
        }
    }

    #[test]
    fn test_unknown_string_degrades_to_none() {
        assert_eq!(next_status_str("on_hold"), None);
        assert_eq!(next_status_str(""), None);
        assert_eq!(next_status_str("analysis"), Some(SampleStatus::Completed));
    }
}
