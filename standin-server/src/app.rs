//! Router assembly.

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use tower_http::cors::{Any, CorsLayer};

use crate::intercept::intercept;
use crate::routes;
use crate::state::AppState;

/// Build the full application: fulfiller API under `admin_prefix`, every other
/// path handled by the intercepting middleware with a 404 fallback.
pub fn build_app(state: AppState, admin_prefix: &str) -> Router {
    let api_router = routes::api_router(state.broker_selected());

    let intercepted = Router::new()
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), intercept));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest(admin_prefix, api_router)
        .merge(intercepted)
        .layer(cors)
        .with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
