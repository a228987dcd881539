//! HTTP front end (axum)

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::service::Lookup;

/// Bounds each request so a stuck connection can't outlive the shutdown grace
/// period.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub fn router(lookup: Arc<Lookup>) -> Router {
    Router::new()
        .route("/health", get(health))
        // A missing or empty ID segment is a bad request, not an unknown route
        .route("/meta", get(missing_id))
        .route("/meta/", get(missing_id))
        .route("/meta/:id", get(get_meta))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(lookup)
}

/// Liveness path, also used by the startup verification probe.
async fn health() -> &'static str {
    "OK"
}

async fn missing_id() -> StatusCode {
    StatusCode::BAD_REQUEST
}

async fn get_meta(State(lookup): State<Arc<Lookup>>, Path(id): Path<String>) -> Response {
    match lookup.get_by_id(&id) {
        Ok(record) => Json(record).into_response(),
        Err(e) => (e.to_http_status(), e.public_message()).into_response(),
    }
}
