use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};

use super::table::{RewritePolicy, RouteTable};
use crate::error::GatewayError;

/// Prefix every routable path starts with.
pub const API_PREFIX: &str = "/api/";

/// A resolved backend target for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Service key taken from the path.
    pub service: String,
    /// Backend base address (no trailing slash).
    pub base_url: String,
    /// Path presented to the backend after rewriting.
    pub path: String,
    /// Fixed headers declared on the route.
    pub headers: Vec<(HeaderName, HeaderValue)>,
    /// Deadline for the backend to produce response headers.
    pub timeout: Duration,
}

impl RouteMatch {
    /// Full target URL, carrying over the inbound query string.
    pub fn target_url(&self, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", self.base_url, self.path, q),
            _ => format!("{}{}", self.base_url, self.path),
        }
    }
}

/// Resolves `/api/{service}/{rest...}` against the route table.
///
/// Resolution performs no I/O; its only failure is [`GatewayError::NotFound`].
#[derive(Debug, Clone)]
pub struct ServiceRouter {
    table: Arc<RouteTable>,
}

impl ServiceRouter {
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn resolve(&self, path: &str) -> Result<RouteMatch, GatewayError> {
        let not_found = || GatewayError::NotFound(path.to_string());

        let (service, rest) = split_service_path(path).ok_or_else(not_found)?;
        let route = self.table.get(service).ok_or_else(not_found)?;

        let rewritten = match route.rewrite() {
            RewritePolicy::StripPrefix if rest.is_empty() => "/".to_string(),
            RewritePolicy::StripPrefix => rest.to_string(),
            RewritePolicy::Preserve => path.to_string(),
        };

        Ok(RouteMatch {
            service: service.to_string(),
            base_url: route.base_url().to_string(),
            path: rewritten,
            headers: route.headers().to_vec(),
            timeout: route.timeout(),
        })
    }
}

/// Split `/api/{service}{rest}` into the service key and the remainder.
///
/// `rest` is either empty or starts with `/`. Returns `None` for paths outside
/// `/api/` or with an empty service segment.
pub fn split_service_path(path: &str) -> Option<(&str, &str)> {
    let after = path.strip_prefix(API_PREFIX)?;
    let (service, rest) = match after.find('/') {
        Some(idx) => after.split_at(idx),
        None => (after, ""),
    };
    if service.is_empty() {
        return None;
    }
    Some((service, rest))
}
