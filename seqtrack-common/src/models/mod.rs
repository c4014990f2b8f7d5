//! Domain models shared by the service and the client
//!
//! Enumerations are stored and transmitted as snake_case strings; `as_str()`
//! and `FromStr` give the canonical form used in SQL columns and query strings.

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum whose
/// serde representation is the same snake_case string.
macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = crate::Error;

            fn from_str(s: &str) -> crate::Result<Self> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(crate::Error::validation(
                        stringify!($ty),
                        format!("unknown value '{}'", other),
                    )),
                }
            }
        }
    };
}

mod bulk;
mod sample;
mod step;

pub use bulk::{BatchReport, BulkOperationRequest, BulkPayload, FailedItem, OperationKind};
pub use sample::{
    AssignRequest, NewSample, Priority, Sample, SampleFilter, SampleId, SamplePatch, SampleStatistics,
    SampleStatus, StatusUpdateRequest,
};
pub use step::{
    CompleteStepRequest, ProcessingStep, StartStepRequest, StepId, StepName, StepNotesRequest,
    StepPatch, StepStatus, DEFAULT_STEP_COUNT,
};
