//! Catch-all handler feeding the request pipeline.

use axum::extract::{Request, State};
use axum::response::Response;

use crate::error::GatewayError;
use crate::pipeline::IncomingRequest;
use crate::state::AppState;

/// Hand every non-operational request to the pipeline.
///
/// Errors render through [`GatewayError`]'s `IntoResponse` as
/// `{"error": .., "status": ..}`.
pub async fn proxy(State(state): State<AppState>, request: Request) -> Result<Response, GatewayError> {
    let request = IncomingRequest::from_http(request);
    state.pipeline.handle(request).await
}
