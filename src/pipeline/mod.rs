//! Request processing pipeline.
//!
//! Runs [`AuthenticationStage`] → [`ServiceRouter`] → [`ForwardingClient`]
//! strictly in that order for each request, short-circuiting on the first
//! failure. A request reaches a backend only if authentication succeeded and
//! routing produced a match.

pub mod context;
pub mod request;

pub use context::{Outcome, PipelineState, RequestContext};
pub use request::IncomingRequest;

use axum::response::Response;

use crate::auth::AuthenticationStage;
use crate::error::GatewayError;
use crate::forwarding::ForwardingClient;
use crate::metrics;
use crate::routing::ServiceRouter;

/// Authentication, routing and forwarding wired together at startup.
#[derive(Debug, Clone)]
pub struct RequestPipeline {
    auth: AuthenticationStage,
    router: ServiceRouter,
    client: ForwardingClient,
}

impl RequestPipeline {
    pub fn new(auth: AuthenticationStage, router: ServiceRouter, client: ForwardingClient) -> Self {
        Self {
            auth,
            router,
            client,
        }
    }

    pub fn router(&self) -> &ServiceRouter {
        &self.router
    }

    /// Process one request to completion.
    pub async fn handle(&self, mut request: IncomingRequest) -> Result<Response, GatewayError> {
        let mut ctx = RequestContext::new(request.correlation_id());

        ctx.advance(PipelineState::Authenticating);
        let identity = match self.auth.authenticate(request.headers()) {
            Ok(identity) => identity,
            Err(e) => {
                metrics::record_auth_failure(e.kind());
                return Err(ctx.fail(e.into()));
            }
        };
        ctx.inject(identity.header_mutation().clone());

        ctx.advance(PipelineState::Routing);
        let route = match self.router.resolve(request.path()) {
            Ok(route) => route,
            Err(e) => return Err(ctx.fail(e)),
        };

        ctx.advance(PipelineState::Forwarding);
        request.apply_headers(ctx.injected());
        match self.client.forward(&route, request).await {
            Ok(response) => {
                ctx.succeed(response.status());
                Ok(response)
            }
            Err(e) => Err(ctx.fail(e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::Router;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::any;
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::auth::TokenValidator;
    use crate::error::AuthError;
    use crate::routing::{GATEWAY_SOURCE_HEADER, RewritePolicy, RouteDefinition, RouteTable};
    use crate::test_utils::{TEST_SECRET, bearer, now_secs, sign_token};

    #[derive(Clone, Default)]
    struct Backend {
        hits: Arc<AtomicUsize>,
        last: Arc<Mutex<Option<(String, HeaderMap)>>>,
    }

    async fn spawn_backend(backend: Backend, delay: Duration) -> SocketAddr {
        let app = Router::new().fallback(any(move |req: Request| {
            let backend = backend.clone();
            async move {
                backend.hits.fetch_add(1, Ordering::SeqCst);
                *backend.last.lock().unwrap() =
                    Some((req.uri().to_string(), req.headers().clone()));
                tokio::time::sleep(delay).await;
                (StatusCode::OK, "backend-ok")
            }
        }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    fn pipeline(addr: SocketAddr, policy: RewritePolicy, timeout: Duration) -> RequestPipeline {
        let base = format!("http://{addr}");
        let routes = ["orders", "catalog"].map(|service| {
            RouteDefinition::new(service, &base, policy, timeout)
                .unwrap()
                .with_header(GATEWAY_SOURCE_HEADER, "shopifake-gateway")
                .unwrap()
        });
        RequestPipeline::new(
            AuthenticationStage::new(TokenValidator::new(TEST_SECRET.as_bytes()).unwrap()),
            ServiceRouter::new(Arc::new(RouteTable::new(routes).unwrap())),
            ForwardingClient::new(Duration::from_secs(2)).unwrap(),
        )
    }

    fn request(path: &str, authorization: Option<String>) -> IncomingRequest {
        let mut builder = axum::http::Request::builder().uri(path);
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        IncomingRequest::from_http(builder.body(Body::empty()).unwrap())
    }

    fn admin_token() -> String {
        sign_token(json!({"id": "u1", "role": "admin", "exp": now_secs() + 300}))
    }

    #[tokio::test]
    async fn test_authenticated_request_reaches_backend_with_identity() {
        let backend = Backend::default();
        let addr = spawn_backend(backend.clone(), Duration::ZERO).await;
        let p = pipeline(addr, RewritePolicy::StripPrefix, Duration::from_secs(5));

        let response = p
            .handle(request("/api/orders/123", Some(bearer(&admin_token()))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(backend.hits.load(Ordering::SeqCst), 1);
        let (uri, headers) = backend.last.lock().unwrap().clone().unwrap();
        assert_eq!(uri, "/123");
        assert_eq!(headers.get("x-user-id").unwrap(), "u1");
        assert_eq!(headers.get("x-user-role").unwrap(), "admin");
        assert_eq!(headers.get("x-gateway-source").unwrap(), "shopifake-gateway");
        assert!(headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_preserve_policy_forwards_full_path() {
        let backend = Backend::default();
        let addr = spawn_backend(backend.clone(), Duration::ZERO).await;
        let p = pipeline(addr, RewritePolicy::Preserve, Duration::from_secs(5));

        p.handle(request("/api/catalog/widgets/7", Some(bearer(&admin_token()))))
            .await
            .unwrap();

        let (uri, _) = backend.last.lock().unwrap().clone().unwrap();
        assert_eq!(uri, "/api/catalog/widgets/7");
    }

    #[tokio::test]
    async fn test_missing_header_never_routes_or_forwards() {
        let backend = Backend::default();
        let addr = spawn_backend(backend.clone(), Duration::ZERO).await;
        let p = pipeline(addr, RewritePolicy::StripPrefix, Duration::from_secs(5));

        // Unknown service too: authentication must fail first with 401, not 404.
        let err = p.handle(request("/api/billing/1", None)).await.unwrap_err();

        assert!(matches!(err, GatewayError::Auth(AuthError::MissingHeader)));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(backend.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_token_never_forwards() {
        let backend = Backend::default();
        let addr = spawn_backend(backend.clone(), Duration::ZERO).await;
        let p = pipeline(addr, RewritePolicy::StripPrefix, Duration::from_secs(5));
        let token = sign_token(json!({"id": "u1", "role": "admin", "exp": 100}));

        let err = p
            .handle(request("/api/orders/1", Some(bearer(&token))))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Auth(AuthError::Expired)));
        assert_eq!(backend.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_role_is_rejected() {
        let backend = Backend::default();
        let addr = spawn_backend(backend.clone(), Duration::ZERO).await;
        let p = pipeline(addr, RewritePolicy::StripPrefix, Duration::from_secs(5));
        let token = sign_token(json!({"id": "u1", "exp": now_secs() + 60}));

        let err = p
            .handle(request("/api/orders/1", Some(bearer(&token))))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Auth(AuthError::MissingRole)));
        assert_eq!(backend.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_service_is_not_found_without_backend_call() {
        let backend = Backend::default();
        let addr = spawn_backend(backend.clone(), Duration::ZERO).await;
        let p = pipeline(addr, RewritePolicy::StripPrefix, Duration::from_secs(5));

        let err = p
            .handle(request("/api/billing/1", Some(bearer(&admin_token()))))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::NotFound(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(backend.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backend_timeout_maps_to_gateway_timeout() {
        let backend = Backend::default();
        let addr = spawn_backend(backend.clone(), Duration::from_secs(3)).await;
        let p = pipeline(addr, RewritePolicy::StripPrefix, Duration::from_millis(150));

        let err = p
            .handle(request("/api/orders/1", Some(bearer(&admin_token()))))
            .await
            .unwrap_err();

        assert!(err.is_backend_failure());
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
