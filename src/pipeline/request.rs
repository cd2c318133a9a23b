use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, Uri};

use crate::auth::HeaderMutation;
use crate::middleware::ip::remote_addr;
use crate::middleware::request_id::RequestIdExt;

/// An inbound request as seen by the pipeline.
///
/// Fields are read-only; the only mutation is the explicit header edit the
/// authentication stage hands to the pipeline before forwarding.
#[derive(Debug)]
pub struct IncomingRequest {
    correlation_id: String,
    remote_addr: String,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
}

impl IncomingRequest {
    /// Capture an axum request.
    ///
    /// The correlation id is taken from `X-Request-Id` (set by
    /// [`RequestIdLayer`](crate::middleware::RequestIdLayer)) or generated.
    pub fn from_http(request: Request<Body>) -> Self {
        let correlation_id = request
            .request_id()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let remote_addr = remote_addr(&request).into_owned();
        let (parts, body) = request.into_parts();

        Self {
            correlation_id,
            remote_addr,
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn apply_headers(&mut self, mutation: &HeaderMutation) {
        if mutation.is_empty() {
            return;
        }
        mutation.apply(&mut self.headers);
    }

    pub(crate) fn into_parts(self) -> (Method, Uri, HeaderMap, Body) {
        (self.method, self.uri, self.headers, self.body)
    }
}
