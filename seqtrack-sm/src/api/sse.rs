//! Server-Sent Events stream of tracker events

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::AppState;

/// GET /events
///
/// Each `TrackerEvent` is sent with its type as the SSE event name and the
/// JSON encoding as data. A lagging client skips the dropped events and
/// keeps streaming.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_bus().subscribe();
    info!("New SSE client connected to tracker events");

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("ConnectionStatus").data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    match Event::default().event(event.event_type()).json_data(&event) {
                        Ok(sse_event) => yield Ok(sse_event),
                        Err(e) => warn!("SSE: failed to encode {}: {}", event.event_type(), e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE client lagging, events dropped");
                }
                Err(RecvError::Closed) => {
                    debug!("SSE: event bus closed");
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
