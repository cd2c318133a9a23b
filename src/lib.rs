//! # Shopifake Gateway
//!
//! Authenticating API gateway that forwards `/api/{service}/**` to the
//! backend owning `{service}`:
//!
//! - **Authentication**: HMAC-signed bearer tokens, identity injected as
//!   `X-User-Id` / `X-User-Role`
//! - **Routing**: static route table, prefix stripping or path preservation
//! - **Forwarding**: streamed bodies, per-route deadlines, no retries
//! - **Observability**: correlation ids, structured access logs, Prometheus
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Access Log → CORS)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, ready, proxy)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RequestPipeline (AuthenticationStage → Router → Forward)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Backend services (access, catalog, orders, ...)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shopifake_gateway::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config)?;
//!     let app = build_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) SERVICES_ORDERS_URL=http://orders:8080 cargo run
//! ```

pub mod auth;
pub mod config;
pub mod cors;
pub mod error;
pub mod forwarding;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod routing;
pub mod state;
pub mod utils;

#[cfg(test)]
mod test_utils;

// Re-exports for convenience
pub use auth::{AuthenticationStage, TokenClaims, TokenValidator};
pub use config::Config;
pub use error::{AppError, AppResult, AuthError, GatewayError};
pub use forwarding::ForwardingClient;
pub use pipeline::{IncomingRequest, RequestPipeline};
pub use routes::build_router;
pub use routing::{RewritePolicy, RouteDefinition, RouteTable, ServiceRouter};
pub use state::AppState;
