//! Shared application state for Axum handlers.
//!
//! Everything here is built once at startup and read-only afterwards. The
//! state is cloned per request; all internal data sits behind `Arc`.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::auth::{AuthenticationStage, TokenValidator};
use crate::config::Config;
use crate::error::AppResult;
use crate::forwarding::ForwardingClient;
use crate::middleware::{AccessLog, TracingAccessLog};
use crate::pipeline::RequestPipeline;
use crate::routing::{RouteTable, ServiceRouter};

/// Shared application state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authentication, routing and forwarding for `/api/**`
    pub pipeline: Arc<RequestPipeline>,
    /// Route table shared with the pipeline's router
    pub routes: Arc<RouteTable>,
    /// Runtime configuration
    pub config: Arc<Config>,
    /// Sink for access log records
    pub access_log: Arc<dyn AccessLog>,
    /// Startup instant for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Assemble the pipeline from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` for an invalid secret or route, and
    /// `AppError::HttpClient` if the outbound client cannot be built.
    pub fn new(config: Config) -> AppResult<Self> {
        let routes = Arc::new(config.route_table()?);
        let validator = TokenValidator::new(config.jwt_secret.as_bytes())?;
        let client = ForwardingClient::new(config.upstream_connect_timeout)?;

        let pipeline = RequestPipeline::new(
            AuthenticationStage::new(validator),
            ServiceRouter::new(routes.clone()),
            client,
        );

        info!(
            routes = routes.len(),
            services = ?routes.services(),
            "Route table loaded"
        );

        Ok(Self {
            pipeline: Arc::new(pipeline),
            routes,
            config: Arc::new(config),
            access_log: Arc::new(TracingAccessLog),
            started_at: Instant::now(),
        })
    }

    /// Replace the access log sink.
    pub fn with_access_log(mut self, access_log: Arc<dyn AccessLog>) -> Self {
        self.access_log = access_log;
        self
    }
}
