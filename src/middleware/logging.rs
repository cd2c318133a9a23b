//! Access logging around the whole request pipeline.
//!
//! Every request produces exactly one start record and exactly one
//! completion record. The start record is emitted synchronously in
//! `Service::call`, before any pipeline stage runs. The completion record is
//! owned by a guard that moves from the response future into the response
//! body, so it is written after the last byte has been handed to the
//! connection and fires on every exit path:
//!
//! | Exit | Recorded status |
//! |---|---|
//! | body streamed to the end (success or gateway error) | response status |
//! | body failed mid-stream | response status |
//! | inner service error | 500 |
//! | future dropped before headers (client went away) | 499, `cancelled = true` |
//! | body dropped before its end (client went away) | 499, `cancelled = true` |
//!
//! Records are handed to an [`AccessLog`] sink. [`TracingAccessLog`] writes
//! them with `tracing` and updates metrics.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{Method, Request, Response, StatusCode};
use chrono::{DateTime, Utc};
use http_body::{Frame, SizeHint};
use tower::{Layer, Service};
use tracing::{error, info, warn};

use super::ip::remote_addr;
use super::request_id::ensure_request_id;
use crate::metrics;

/// Status recorded when the caller disconnects before the response is complete.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Request metadata captured before the pipeline runs.
#[derive(Debug, Clone)]
pub struct RequestStart {
    pub correlation_id: String,
    pub method: Method,
    pub path: String,
    pub remote_addr: String,
    pub started_at: DateTime<Utc>,
}

/// Result of one request, captured after the pipeline finished.
#[derive(Debug, Clone)]
pub struct RequestCompletion {
    pub correlation_id: String,
    pub method: Method,
    pub path: String,
    pub status: u16,
    pub duration: Duration,
    pub cancelled: bool,
}

/// Sink for access log records.
pub trait AccessLog: Send + Sync + 'static {
    fn request_started(&self, start: &RequestStart);
    fn request_completed(&self, completion: &RequestCompletion);
}

/// Default sink: structured `tracing` events plus request metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAccessLog;

impl AccessLog for TracingAccessLog {
    fn request_started(&self, start: &RequestStart) {
        metrics::request_started();
        info!(
            correlation_id = %start.correlation_id,
            method = %start.method,
            path = %start.path,
            remote_addr = %start.remote_addr,
            started_at = %start.started_at.to_rfc3339(),
            "Incoming request"
        );
    }

    fn request_completed(&self, c: &RequestCompletion) {
        metrics::request_finished(c.method.as_str(), c.status, c.duration.as_secs_f64());
        let duration_ms = c.duration.as_millis() as u64;

        if c.cancelled {
            warn!(
                correlation_id = %c.correlation_id,
                method = %c.method,
                path = %c.path,
                status = c.status,
                duration_ms,
                "Request cancelled by client"
            );
        } else if c.status >= 500 {
            error!(
                correlation_id = %c.correlation_id,
                method = %c.method,
                path = %c.path,
                status = c.status,
                duration_ms,
                "Request completed"
            );
        } else if c.status >= 400 {
            warn!(
                correlation_id = %c.correlation_id,
                method = %c.method,
                path = %c.path,
                status = c.status,
                duration_ms,
                "Request completed"
            );
        } else {
            info!(
                correlation_id = %c.correlation_id,
                method = %c.method,
                path = %c.path,
                status = c.status,
                duration_ms,
                "Request completed"
            );
        }
    }
}

/// Logging layer wrapping the pipeline.
#[derive(Clone)]
pub struct LoggingLayer {
    log: Arc<dyn AccessLog>,
}

impl LoggingLayer {
    pub fn new(log: Arc<dyn AccessLog>) -> Self {
        Self { log }
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService {
            inner,
            log: self.log.clone(),
        }
    }
}

/// Logging service wrapper.
#[derive(Clone)]
pub struct LoggingService<S> {
    inner: S,
    log: Arc<dyn AccessLog>,
}

impl<S> Service<Request<Body>> for LoggingService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let correlation_id = ensure_request_id(&mut req)
            .to_str()
            .map(str::to_string)
            .unwrap_or_else(|_| "unknown".to_string());

        let start = RequestStart {
            correlation_id,
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            remote_addr: remote_addr(&req).into_owned(),
            started_at: Utc::now(),
        };
        self.log.request_started(&start);

        let mut guard = CompletionGuard {
            log: self.log.clone(),
            start,
            timer: Instant::now(),
            status: None,
            recorded: false,
        };
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = match inner.call(req).await {
                Ok(response) => response,
                Err(e) => {
                    guard.complete(StatusCode::INTERNAL_SERVER_ERROR.as_u16(), false);
                    return Err(e);
                }
            };

            let (parts, body) = response.into_parts();
            // Hyper never polls a body that is already at its end, nor the body of
            // a HEAD response.
            if body.is_end_stream() || guard.start.method == Method::HEAD {
                guard.complete(parts.status.as_u16(), false);
                return Ok(Response::from_parts(parts, body));
            }

            guard.status = Some(parts.status);
            let body = Body::new(LoggedBody { inner: body, guard });
            Ok(Response::from_parts(parts, body))
        })
    }
}

/// Emits the completion record exactly once, at the latest when dropped.
struct CompletionGuard {
    log: Arc<dyn AccessLog>,
    start: RequestStart,
    timer: Instant,
    /// Response status, once headers exist.
    status: Option<StatusCode>,
    recorded: bool,
}

impl CompletionGuard {
    fn complete(&mut self, status: u16, cancelled: bool) {
        if self.recorded {
            return;
        }
        self.recorded = true;
        self.log.request_completed(&RequestCompletion {
            correlation_id: std::mem::take(&mut self.start.correlation_id),
            method: self.start.method.clone(),
            path: std::mem::take(&mut self.start.path),
            status,
            duration: self.timer.elapsed(),
            cancelled,
        });
    }

    fn complete_with_response_status(&mut self) {
        let status = self
            .status
            .map_or(StatusCode::INTERNAL_SERVER_ERROR.as_u16(), |s| s.as_u16());
        self.complete(status, false);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.complete(CLIENT_CLOSED_REQUEST, true);
    }
}

/// Response body that writes the completion record when it ends.
struct LoggedBody {
    inner: Body,
    guard: CompletionGuard,
}

impl HttpBody for LoggedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_frame(cx);
        match &poll {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => {
                this.guard.complete_with_response_status();
            }
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => {
                this.guard.complete_with_response_status();
            }
            _ => {}
        }
        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
