//! Intercepting middleware: answers matched routes with the configured generator.

use std::borrow::Cow;

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use standin::core::types::RequestContext;
use standin::generator::Deadline;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Largest request body captured into the request context.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Generate a response for matched requests; pass everything else through.
///
/// A dropped connection drops this future, which releases any parked entry.
pub async fn intercept(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(route) = state
        .routes
        .matches(request.method().as_str(), request.uri().path())
        .cloned()
    else {
        debug!(method = %request.method(), path = %request.uri().path(), "no route matched");
        return next.run(request).await;
    };

    info!(
        method = %request.method(),
        path = %request.uri().path(),
        prefix = %route.path_prefix,
        generator = state.generator.name(),
        "intercepted request"
    );

    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed to read request body");
            return (StatusCode::BAD_REQUEST, format!("read request body: {err}")).into_response();
        }
    };
    let context = request_context(&parts, &body);

    let deadline = state
        .request_timeout
        .map(|timeout| Deadline::new(&state.shutdown, timeout));
    let cancel = match &deadline {
        Some(deadline) => deadline.token().clone(),
        None => state.shutdown.child_token(),
    };

    match state.generator.produce(&context, &route.schema, &cancel).await {
        Ok(payload) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "application/json")],
            Body::from(payload),
        )
            .into_response(),
        Err(err) if err.is_cancelled() => {
            warn!(error = %err, "generation cancelled");
            (StatusCode::SERVICE_UNAVAILABLE, format!("Mock generation cancelled: {err}"))
                .into_response()
        }
        Err(err) => {
            warn!(error = %err, "generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Mock generation failed: {err}"),
            )
                .into_response()
        }
    }
}

/// Capture the request as seen on the wire. Header values that are not valid
/// UTF-8 are kept with replacement characters rather than dropped.
fn request_context(parts: &Parts, body: &[u8]) -> RequestContext {
    let headers: Vec<(&str, Cow<'_, str>)> = parts
        .headers
        .iter()
        .map(|(name, value)| (name.as_str(), String::from_utf8_lossy(value.as_bytes())))
        .collect();
    RequestContext::new(
        parts.method.as_str(),
        parts.uri.to_string(),
        headers.iter().map(|(name, value)| (*name, value.as_ref())),
        body,
    )
}
