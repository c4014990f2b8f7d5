//! # SeqTrack Common Library
//!
//! Shared code for the SeqTrack sample service and client:
//! - Sample and processing step models
//! - Status progression and the processing step engine
//! - Bulk operation validation and bounded fan-out
//! - The `SampleStore` persistence interface
//! - Tracker events, configuration and logging setup

pub mod bulk;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod status;
pub mod steps;
pub mod store;
pub mod time;

pub use error::{Error, MutationError, Result, StateError};
pub use store::{SampleStore, StoreResult};
