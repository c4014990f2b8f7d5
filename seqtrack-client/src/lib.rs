//! seqtrack-client - optimistic client for the SeqTrack sample service
//!
//! `SampleClient` keeps a local cache of samples and processing steps in step
//! with a `SampleStore`. Every edit is applied to the cache immediately and
//! reconciled or rolled back once the store answers. Bulk operations fan out
//! through `BulkOperationCoordinator` and report per-item outcomes.

pub mod cache;
pub mod client;
pub mod coordinator;
pub mod http;
pub mod sync;

pub use cache::EntityCache;
pub use client::SampleClient;
pub use coordinator::{BulkOperationCoordinator, NOT_CACHED, TERMINAL_STATUS};
pub use http::HttpSampleStore;
pub use sync::{CacheSynchronizer, MutationId, MutationState, Settlement};
