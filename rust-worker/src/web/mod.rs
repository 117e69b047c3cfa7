//! Web server module for receiving form submissions.
//!
//! Routes:
//! - `GET /health`
//! - `POST <submit_path>` (default `/api/contact`)
//!
//! Every route answers CORS preflights and allows any origin.

pub mod handlers;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use handlers::{health, submit, AppState, HealthResponse, SubmitResponse};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let submit_path = state.config.submit_path.clone();

    Router::new()
        .route("/health", get(health))
        .route(&submit_path, post(submit))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Permissive CORS: any origin, `POST`/`OPTIONS`, `Content-Type` header.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
