use std::time::Instant;

use axum::http::StatusCode;
use tracing::debug;

use crate::auth::HeaderMutation;
use crate::error::GatewayError;

/// Terminal result of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
}

/// Pipeline progress for one request.
///
/// ```text
/// Start → Authenticating → Routing → Forwarding → Completed(Success)
///              │              │           │
///              └──────────────┴───────────┴─────→ Completed(Failed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Authenticating,
    Routing,
    Forwarding,
    Completed(Outcome),
}

impl PipelineState {
    pub fn can_advance_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Start, Authenticating)
                | (Authenticating, Routing)
                | (Routing, Forwarding)
                | (Forwarding, Completed(_))
                | (Authenticating, Completed(Outcome::Failed))
                | (Routing, Completed(Outcome::Failed))
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Completed(_))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Start => "start",
            PipelineState::Authenticating => "authenticating",
            PipelineState::Routing => "routing",
            PipelineState::Forwarding => "forwarding",
            PipelineState::Completed(Outcome::Success) => "completed",
            PipelineState::Completed(Outcome::Failed) => "failed",
        }
    }
}

/// Per-request state, owned by a single pipeline invocation.
#[derive(Debug)]
pub struct RequestContext {
    correlation_id: String,
    started_at: Instant,
    state: PipelineState,
    injected: HeaderMutation,
}

impl RequestContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            started_at: Instant::now(),
            state: PipelineState::Start,
            injected: HeaderMutation::default(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn injected(&self) -> &HeaderMutation {
        &self.injected
    }

    pub fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal pipeline transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    pub fn inject(&mut self, mutation: HeaderMutation) {
        self.injected = mutation;
    }

    /// Complete successfully with the backend's status.
    pub fn succeed(&mut self, status: StatusCode) {
        self.advance(PipelineState::Completed(Outcome::Success));
        self.finish(status, None);
    }

    /// Complete with a failure, handing the error back for propagation.
    pub fn fail(&mut self, error: GatewayError) -> GatewayError {
        let failed_in = self.state;
        self.advance(PipelineState::Completed(Outcome::Failed));
        self.finish(error.status(), Some((failed_in, &error)));
        error
    }

    fn finish(&self, status: StatusCode, failure: Option<(PipelineState, &GatewayError)>) {
        debug_assert!(
            self.state.is_terminal(),
            "pipeline finished in {:?}",
            self.state
        );
        let elapsed = self.started_at.elapsed();
        match failure {
            Some((stage, error)) => debug!(
                correlation_id = %self.correlation_id,
                stage = stage.as_str(),
                kind = error.kind(),
                backend = error.is_backend_failure(),
                status = status.as_u16(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Pipeline short-circuited"
            ),
            None => debug!(
                correlation_id = %self.correlation_id,
                status = status.as_u16(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Pipeline completed"
            ),
        }
    }
}
