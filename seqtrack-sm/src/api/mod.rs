//! HTTP API handlers for seqtrack-sm

pub mod health;
pub mod samples;
pub mod sse;
pub mod steps;

pub use health::health_routes;
pub use samples::sample_routes;
pub use sse::event_stream;
pub use steps::step_routes;
