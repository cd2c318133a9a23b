//! Application routing with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Accepts or generates X-Request-Id, echoes it
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Access Log     │ ← One start + one completion record per request
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │      CORS        │ ← Answers preflight without a token
//! └────────┬─────────┘
//!          │
//!          ▼
//!   /health, /ready  or  pipeline (auth → route → forward)
//! ```

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::cors::build_cors_layer;
use crate::handlers;
use crate::middleware::{LoggingLayer, RequestIdLayer};
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    info!(
        origins = ?config.cors.allowed_origins,
        credentials = config.cors.allow_credentials,
        "CORS configured"
    );
    let cors = build_cors_layer(&config.cors);
    let access_log = LoggingLayer::new(state.access_log.clone());

    Router::new()
        // Operational endpoints (outside /api, no authentication)
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        // Everything else goes through the pipeline
        .fallback(handlers::proxy)
        .layer(cors)
        .layer(access_log)
        .layer(RequestIdLayer::new())
        .with_state(state)
}
