use std::time::Duration;

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Failures of the authentication stage.
///
/// Every variant except [`AuthError::Internal`] is a client problem and maps
/// to 401. `Internal` covers a misconfigured key or any other failure that is
/// not the caller's fault and maps to 500.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing or invalid Authorization header")]
    MissingHeader,

    #[error("token verification failed: {0}")]
    InvalidSignature(String),

    #[error("token expired")]
    Expired,

    #[error("role claim missing in token")]
    MissingRole,

    #[error("internal authentication failure: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "missing_header",
            AuthError::InvalidSignature(_) => "invalid_signature",
            AuthError::Expired => "expired",
            AuthError::MissingRole => "missing_role",
            AuthError::Internal(_) => "auth_internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Errors produced while processing a proxied request.
///
/// Constructed at the point of failure and rendered unchanged by
/// [`IntoResponse`]. The `Display` text carries diagnostic detail for the
/// server log; the response body only ever carries the status reason phrase.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("no route for path {0}")]
    NotFound(String),

    #[error("backend '{service}' unavailable: {reason}")]
    BackendUnavailable { service: String, reason: String },

    #[error("backend '{service}' did not respond within {after:?}")]
    Timeout { service: String, after: Duration },
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Auth(e) => e.status(),
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::BackendUnavailable { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Stable label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Auth(e) => e.kind(),
            GatewayError::NotFound(_) => "not_found",
            GatewayError::BackendUnavailable { .. } => "backend_unavailable",
            GatewayError::Timeout { .. } => "timeout",
        }
    }

    /// Whether the failure happened after a backend was selected.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            GatewayError::BackendUnavailable { .. } | GatewayError::Timeout { .. }
        )
    }
}

/// Uniform error body: `{"error": "<reason phrase>", "status": <code>}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub status: u16,
}

impl ErrorBody {
    pub fn for_status(status: StatusCode) -> Self {
        Self {
            error: status.canonical_reason().unwrap_or("Error"),
            status: status.as_u16(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Request failed");
        } else {
            tracing::warn!(error = %self, kind = self.kind(), "Request rejected");
        }

        let mut response = (status, axum::Json(ErrorBody::for_status(status))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Startup errors: configuration and resource construction.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
