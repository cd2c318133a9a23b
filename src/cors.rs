//! Cross-origin resource sharing.
//!
//! CORS runs as a sibling of the authenticated pipeline, not inside it:
//! preflight `OPTIONS` requests are answered here and never need a token.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method, request::Parts};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::warn;

use crate::config::CorsConfig;

/// How long browsers may cache a preflight response.
pub const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Build the CORS layer from configuration.
///
/// A lone `*` in a list mirrors the request value, which stays valid when
/// credentials are allowed. Origin entries containing `*` are glob patterns
/// such as `https://*.example.com`.
pub fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allow_origin(&config.allowed_origins))
        .allow_methods(allow_methods(&config.allowed_methods))
        .allow_headers(allow_headers(&config.allowed_headers))
        .allow_credentials(config.allow_credentials)
        .max_age(PREFLIGHT_MAX_AGE)
}

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v == "*")
}

fn allow_origin(origins: &[String]) -> AllowOrigin {
    if is_wildcard(origins) {
        return AllowOrigin::mirror_request();
    }

    let patterns = origins.to_vec();
    AllowOrigin::predicate(move |origin: &HeaderValue, _parts: &Parts| {
        origin
            .to_str()
            .map(|origin| patterns.iter().any(|p| origin_matches(p, origin)))
            .unwrap_or(false)
    })
}

fn allow_methods(methods: &[String]) -> AllowMethods {
    if is_wildcard(methods) {
        return AllowMethods::mirror_request();
    }

    let parsed: Vec<Method> = methods
        .iter()
        .filter_map(|m| match m.to_ascii_uppercase().parse() {
            Ok(method) => Some(method),
            Err(_) => {
                warn!(method = %m, "Ignoring invalid CORS method");
                None
            }
        })
        .collect();
    AllowMethods::list(parsed)
}

fn allow_headers(headers: &[String]) -> AllowHeaders {
    if is_wildcard(headers) {
        return AllowHeaders::mirror_request();
    }

    let parsed: Vec<HeaderName> = headers
        .iter()
        .filter_map(|h| match h.parse() {
            Ok(name) => Some(name),
            Err(_) => {
                warn!(header = %h, "Ignoring invalid CORS header name");
                None
            }
        })
        .collect();
    AllowHeaders::list(parsed)
}

/// Match an origin against an exact value or a `*` glob pattern.
pub fn origin_matches(pattern: &str, origin: &str) -> bool {
    if !pattern.contains('*') {
        return pattern.eq_ignore_ascii_case(origin);
    }

    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = origin.strip_prefix(first) else {
        return false;
    };

    let mut parts: Vec<&str> = parts.collect();
    let last = parts.pop().unwrap_or_default();
    for part in parts {
        match rest.find(part) {
            Some(idx) => rest = rest.get(idx + part.len()..).unwrap_or_default(),
            None => return false,
        }
    }
    rest.ends_with(last)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode, header};
    use tower::{Layer, ServiceExt};

    use super::*;

    async fn preflight(config: &CorsConfig, origin: &str) -> Response<Body> {
        let svc = build_cors_layer(config).layer(tower::service_fn(|_req: Request<Body>| async {
            Ok::<_, std::convert::Infallible>(Response::new(Body::empty()))
        }));

        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/orders/1")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
            .body(Body::empty())
            .unwrap();
        svc.oneshot(req).await.unwrap()
    }

    #[test]
    fn test_origin_matches_exact() {
        assert!(origin_matches("https://app.example.com", "https://app.example.com"));
        assert!(!origin_matches("https://app.example.com", "https://evil.example.com"));
    }

    #[test]
    fn test_origin_matches_glob() {
        assert!(origin_matches("https://*.example.com", "https://shop.example.com"));
        assert!(origin_matches("http://localhost:*", "http://localhost:5173"));
        assert!(!origin_matches("https://*.example.com", "https://example.org"));
        assert!(!origin_matches("https://*.example.com", "http://shop.example.com"));
        assert!(origin_matches("*", "https://anything.test"));
    }

    #[tokio::test]
    async fn test_wildcard_mirrors_origin_with_max_age() {
        let response = preflight(&CorsConfig::default(), "https://shop.test").await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://shop.test");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "3600");
        assert!(
            headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
                .to_str()
                .unwrap()
                .contains("authorization")
        );
    }

    #[tokio::test]
    async fn test_pattern_rejects_unlisted_origin() {
        let config = CorsConfig {
            allowed_origins: vec!["https://*.example.com".to_string()],
            allow_credentials: true,
            ..CorsConfig::default()
        };

        let allowed = preflight(&config, "https://admin.example.com").await;
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://admin.example.com"
        );
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
            "true"
        );

        let denied = preflight(&config, "https://evil.test").await;
        assert!(
            !denied
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }
}
