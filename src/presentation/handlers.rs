// HTTP request handlers
use crate::application::transport::{publish_raw, TransportAdapter};
use crate::domain::dashboard::SeriesSnapshot;
use crate::infrastructure::websocket_adapter::WebSocketAdapter;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Response,
    },
    Json,
};
use futures::stream::Stream;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct CapacityRequest {
    pub capacity: usize,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Every populated series, keyed by series key
pub async fn list_series(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, SeriesSnapshot>> {
    Json(state.router.get_all_snapshots())
}

pub async fn get_series(
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SeriesSnapshot>, StatusCode> {
    state
        .router
        .get_snapshot(&key)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Server-sent events carrying the latest dashboard snapshot after each update.
/// Bursts of updates may be coalesced into one event.
pub async fn stream_snapshots(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let mut rx = state.router.watch();

    let stream = async_stream::stream! {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            yield Event::default().event("snapshot").json_data(&*snapshot);
            if rx.changed().await.is_err() {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn set_capacity(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CapacityRequest>,
) -> StatusCode {
    match state.router.set_capacity(request.capacity) {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => {
            tracing::warn!(error = %e, "capacity change rejected");
            StatusCode::BAD_REQUEST
        }
    }
}

/// Single-record ingest over plain HTTP
pub async fn post_record(State(state): State<Arc<AppState>>, body: String) -> StatusCode {
    match publish_raw(
        &state.hub,
        "http",
        &body,
        state.default_batch_series.as_deref(),
    ) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::BAD_REQUEST,
    }
}

/// Upgrade to a WebSocket and feed its frames into the hub
pub async fn ingest(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let connection = state.ingest_connections.fetch_add(1, Ordering::Relaxed);

    ws.on_upgrade(move |socket| async move {
        let mut adapter = WebSocketAdapter::new(
            format!("ws-{}", connection),
            socket,
            state.default_batch_series.clone(),
        );
        if let Err(e) = adapter.run(&state.hub).await {
            tracing::error!(adapter = adapter.name(), error = %e, "ingest connection failed");
        }
    })
}
