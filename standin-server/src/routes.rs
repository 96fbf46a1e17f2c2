//! HTTP route handlers for the fulfiller API.

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Serialize;
use standin::core::types::PendingEntry;
use standin::error::BrokerError;
use tracing::info;

use crate::sse;
use crate::state::AppState;

/// Build the fulfiller API router.
///
/// The pending-request endpoints are only mounted when the broker is the
/// active generator; otherwise nothing would ever be pending.
pub fn api_router(broker_selected: bool) -> Router<AppState> {
    let router = Router::new().route("/health", get(health));
    if !broker_selected {
        return router;
    }
    router
        .route("/pending", get(list_pending))
        .route("/pending/{id}", post(fulfill))
        .route("/events", get(sse::events_handler))
}

async fn health() -> &'static str {
    "ok"
}

/// GET /pending - parked requests, oldest first.
async fn list_pending(State(state): State<AppState>) -> Json<Vec<PendingEntry>> {
    Json(state.broker.list_pending())
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// POST /pending/:id - deliver the request body as the response for `id`.
async fn fulfill(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, Response> {
    match state.broker.fulfill(&id, body.to_vec()) {
        Ok(()) => {
            info!(id = %id, "fulfilled via http");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(err) => Err(error_response(&err)),
    }
}

fn error_response(err: &BrokerError) -> Response {
    let status = match err {
        BrokerError::NotFound(_) => StatusCode::NOT_FOUND,
        BrokerError::AlreadyFulfilled(_) => StatusCode::CONFLICT,
        BrokerError::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BrokerError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}
