//! Fuzz testing for request path resolution and bearer parsing.
//!
//! Ensures that for any input:
//!
//! - Route resolution never panics and only matches configured services
//! - A strip-prefix match always yields a path starting with `/`
//! - Bearer extraction never panics and never returns a token with surrounding whitespace
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_routing -- -max_total_time=60
//! ```

#![no_main]

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use arbitrary::Arbitrary;
use axum::http::{HeaderMap, HeaderValue, header};
use libfuzzer_sys::fuzz_target;
use shopifake_gateway::auth::extract_bearer;
use shopifake_gateway::routing::router::split_service_path;
use shopifake_gateway::{RewritePolicy, RouteDefinition, RouteTable, ServiceRouter};

static ROUTER: LazyLock<Option<ServiceRouter>> = LazyLock::new(|| {
    let routes = [
        ("orders", RewritePolicy::StripPrefix),
        ("catalog", RewritePolicy::Preserve),
        ("sales-dashboard", RewritePolicy::StripPrefix),
    ]
    .into_iter()
    .map(|(name, rewrite)| {
        RouteDefinition::new(name, "http://backend:8080", rewrite, Duration::from_secs(1))
    })
    .collect::<Result<Vec<_>, _>>()
    .ok()?;
    let table = RouteTable::new(routes).ok()?;
    Some(ServiceRouter::new(Arc::new(table)))
});

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    path: &'a str,
    authorization: &'a [u8],
}

fuzz_target!(|input: Input<'_>| {
    if let Some((service, rest)) = split_service_path(input.path) {
        assert!(!service.is_empty());
        assert!(!service.contains('/'));
        assert!(rest.is_empty() || rest.starts_with('/'));
    }

    if let Some(router) = ROUTER.as_ref() {
        if let Ok(route) = router.resolve(input.path) {
            assert!(router.table().get(&route.service).is_some());
            assert!(route.path.starts_with('/'));
        }
    }

    if let Ok(value) = HeaderValue::from_bytes(input.authorization) {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value);
        if let Ok(token) = extract_bearer(&headers) {
            assert_eq!(token, token.trim());
        }
    }
});
