//! HTTP middleware wrapped around the gateway pipeline.
//!
//! - **Request ID**: accepts or generates `X-Request-Id` and echoes it back
//! - **Access logging**: one start and one completion record per request
//! - **Remote address**: peer address resolution for log records
//!
//! # Architecture
//!
//! ```text
//! Request → Request ID → Access Log → CORS → Router (health | pipeline) → Response
//!               ↓             ↓
//!        X-Request-Id    start / completion (499 on cancel)
//! ```

pub mod ip;
pub mod logging;
pub mod request_id;

pub use ip::{UNKNOWN_ADDR, remote_addr};
pub use logging::{
    AccessLog, CLIENT_CLOSED_REQUEST, LoggingLayer, RequestCompletion, RequestStart,
    TracingAccessLog,
};
pub use request_id::{REQUEST_ID_HEADER, RequestIdExt, RequestIdLayer, ensure_request_id};
