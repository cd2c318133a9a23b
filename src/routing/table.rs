//! Immutable service route table.
//!
//! Built once at startup from [`Config`](crate::Config) and shared behind an
//! `Arc`. There are no mutating methods; resolution reads it without locks.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};

use crate::error::{AppError, AppResult};

/// Marker header identifying requests that passed through the gateway.
pub const GATEWAY_SOURCE_HEADER: &str = "x-gateway-source";

/// How the inbound path is presented to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RewritePolicy {
    /// Drop `/api/{service}` and forward only `{rest...}` (`/` when empty).
    #[default]
    StripPrefix,
    /// Forward the original path unchanged.
    Preserve,
}

impl RewritePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            RewritePolicy::StripPrefix => "strip",
            RewritePolicy::Preserve => "preserve",
        }
    }
}

impl fmt::Display for RewritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RewritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strip" | "strip_prefix" | "strip-prefix" => Ok(RewritePolicy::StripPrefix),
            "preserve" | "full" | "none" => Ok(RewritePolicy::Preserve),
            other => Err(format!(
                "unknown path rewrite policy '{other}' (expected 'strip' or 'preserve')"
            )),
        }
    }
}

/// One backend service reachable through the gateway.
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    service: String,
    base_url: String,
    rewrite: RewritePolicy,
    headers: Vec<(HeaderName, HeaderValue)>,
    timeout: Duration,
}

impl RouteDefinition {
    /// Create a route, validating the service key and base address.
    ///
    /// The base URL must be absolute `http`/`https`; a trailing `/` is
    /// removed so that concatenation with the rewritten path is exact.
    pub fn new(
        service: impl Into<String>,
        base_url: &str,
        rewrite: RewritePolicy,
        timeout: Duration,
    ) -> AppResult<Self> {
        let service = service.into();
        if service.is_empty() || service.contains('/') {
            return Err(AppError::ConfigError(format!(
                "invalid service name '{service}': must be non-empty and contain no '/'"
            )));
        }

        let parsed = reqwest::Url::parse(base_url).map_err(|e| {
            AppError::ConfigError(format!("invalid base URL for '{service}': {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::ConfigError(format!(
                "base URL for '{service}' must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if parsed.query().is_some() {
            return Err(AppError::ConfigError(format!(
                "base URL for '{service}' must not carry a query string"
            )));
        }

        if timeout.is_zero() {
            return Err(AppError::ConfigError(format!(
                "timeout for '{service}' must be greater than 0"
            )));
        }

        Ok(Self {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            rewrite,
            headers: Vec::new(),
            timeout,
        })
    }

    /// Add a fixed header sent on every request forwarded through this route.
    pub fn with_header(mut self, name: &str, value: &str) -> AppResult<Self> {
        let name = HeaderName::from_str(name)
            .map_err(|e| AppError::ConfigError(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            AppError::ConfigError(format!("invalid value for header '{name}': {e}"))
        })?;
        self.headers.push((name, value));
        Ok(self)
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rewrite(&self) -> RewritePolicy {
        self.rewrite
    }

    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Service name to route mapping, fixed for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, RouteDefinition>,
}

impl RouteTable {
    /// Build the table, rejecting duplicate service names.
    pub fn new(definitions: impl IntoIterator<Item = RouteDefinition>) -> AppResult<Self> {
        let mut routes = HashMap::new();
        for definition in definitions {
            let service = definition.service.clone();
            if routes.insert(service.clone(), definition).is_some() {
                return Err(AppError::ConfigError(format!(
                    "duplicate route for service '{service}'"
                )));
            }
        }
        Ok(Self { routes })
    }

    pub fn get(&self, service: &str) -> Option<&RouteDefinition> {
        self.routes.get(service)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Service names in sorted order (for startup logging).
    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn route(service: &str, url: &str) -> RouteDefinition {
        RouteDefinition::new(
            service,
            url,
            RewritePolicy::StripPrefix,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_rewrite_policy_parsing() {
        assert_eq!(
            "strip".parse::<RewritePolicy>().unwrap(),
            RewritePolicy::StripPrefix
        );
        assert_eq!(
            " Preserve ".parse::<RewritePolicy>().unwrap(),
            RewritePolicy::Preserve
        );
        assert!("rewrite-all".parse::<RewritePolicy>().is_err());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let def = route("catalog", "http://localhost:8083/");
        assert_eq!(def.base_url(), "http://localhost:8083");
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let result = RouteDefinition::new(
            "catalog",
            "ftp://files.local",
            RewritePolicy::StripPrefix,
            Duration::from_secs(5),
        );
        assert!(result.unwrap_err().to_string().contains("http or https"));
    }

    #[test]
    fn test_rejects_relative_base_url() {
        let result = RouteDefinition::new(
            "catalog",
            "localhost:8083",
            RewritePolicy::StripPrefix,
            Duration::from_secs(5),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_service_name_with_slash() {
        let result = RouteDefinition::new(
            "cat/alog",
            "http://localhost:8083",
            RewritePolicy::StripPrefix,
            Duration::from_secs(5),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let result = RouteDefinition::new(
            "catalog",
            "http://localhost:8083",
            RewritePolicy::StripPrefix,
            Duration::ZERO,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_with_header_validates() {
        let def = route("catalog", "http://localhost:8083")
            .with_header(GATEWAY_SOURCE_HEADER, "shopifake-gateway")
            .unwrap();
        assert_eq!(def.headers().len(), 1);

        let bad = route("catalog", "http://localhost:8083").with_header("bad header", "x");
        assert!(bad.is_err());
    }

    #[test]
    fn test_table_rejects_duplicates() {
        let result = RouteTable::new(vec![
            route("orders", "http://localhost:8086"),
            route("orders", "http://localhost:9999"),
        ]);
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_table_lookup_and_services() {
        let table = RouteTable::new(vec![
            route("orders", "http://localhost:8086"),
            route("catalog", "http://localhost:8083"),
        ])
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.services(), vec!["catalog", "orders"]);
        assert_eq!(
            table.get("orders").unwrap().base_url(),
            "http://localhost:8086"
        );
        assert!(table.get("billing").is_none());
    }
}
