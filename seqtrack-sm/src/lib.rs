//! seqtrack-sm library - Sample Management service
//!
//! HTTP front end over the SQLite sample store. Handlers are thin: they
//! decode the request, call the `SampleStore` implementation and map errors.

use axum::Router;
use seqtrack_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod store;

pub use error::{ApiError, ApiResult};
pub use store::SqliteSampleStore;

/// Default EventBus capacity
pub const EVENT_BUS_CAPACITY: usize = 1000;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteSampleStore>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, bulk_concurrency: usize) -> Self {
        Self {
            store: Arc::new(SqliteSampleStore::new(db, event_bus, bulk_concurrency)),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        self.store.event_bus()
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::sample_routes())
        .merge(api::step_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
