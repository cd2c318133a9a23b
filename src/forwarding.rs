//! Outbound forwarding to the resolved backend.
//!
//! One call per request, no retries. The request body is streamed to the
//! backend and the backend's body is streamed back without buffering. The
//! route deadline bounds the wait for response headers; once headers arrive
//! the body is relayed until either side closes.
//!
//! Dropping the future returned by [`ForwardingClient::forward`] (the caller
//! went away) cancels the outbound call and releases its connection.

use std::time::Duration;

use axum::body::{Body, HttpBody};
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::response::Response;
use tracing::{debug, warn};

use crate::error::{AppResult, GatewayError};
use crate::metrics;
use crate::pipeline::IncomingRequest;
use crate::routing::RouteMatch;

/// Headers that describe a single transport hop and are never relayed.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
];

/// Non-blocking HTTP client shared by all routes.
#[derive(Debug, Clone)]
pub struct ForwardingClient {
    client: reqwest::Client,
}

impl ForwardingClient {
    /// Build the client with a connect timeout applied to every backend.
    pub fn new(connect_timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    /// Forward the request to `route` and relay the backend response.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Timeout`] if no response headers arrive within the
    ///   route deadline, or the connection attempt times out
    /// - [`GatewayError::BackendUnavailable`] for refused or failed connections
    pub async fn forward(
        &self,
        route: &RouteMatch,
        request: IncomingRequest,
    ) -> Result<Response, GatewayError> {
        let (method, uri, mut headers, body) = request.into_parts();

        strip_hop_by_hop(&mut headers);
        headers.remove(header::UPGRADE);
        headers.remove(header::HOST);
        for (name, value) in &route.headers {
            headers.insert(name.clone(), value.clone());
        }

        let url = route.target_url(uri.query());
        debug!(service = %route.service, %method, url = %url, "Forwarding to backend");

        let mut outbound = self.client.request(method, &url).headers(headers);
        if !body.is_end_stream() {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = match tokio::time::timeout(route.timeout, outbound.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(classify_send_error(route, &e)),
            Err(_) => {
                return Err(upstream_failure(
                    route,
                    GatewayError::Timeout {
                        service: route.service.clone(),
                        after: route.timeout,
                    },
                ));
            }
        };

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        strip_hop_by_hop(&mut response_headers);

        debug!(service = %route.service, status = status.as_u16(), "Backend responded");

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

fn classify_send_error(route: &RouteMatch, err: &reqwest::Error) -> GatewayError {
    let error = if err.is_timeout() {
        GatewayError::Timeout {
            service: route.service.clone(),
            after: route.timeout,
        }
    } else {
        GatewayError::BackendUnavailable {
            service: route.service.clone(),
            reason: err.to_string(),
        }
    };
    upstream_failure(route, error)
}

fn upstream_failure(route: &RouteMatch, error: GatewayError) -> GatewayError {
    warn!(service = %route.service, kind = error.kind(), error = %error, "Backend call failed");
    metrics::record_upstream_failure(&route.service, error.kind());
    error
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in &listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
