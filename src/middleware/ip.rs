//! Remote address resolution for request logging.
//!
//! # Resolution order
//!
//! 1. The TCP peer address (`ConnectInfo<SocketAddr>`), present when the
//!    server is started with `into_make_service_with_connect_info`
//! 2. First entry of `X-Forwarded-For`
//! 3. `X-Real-IP`
//! 4. [`UNKNOWN_ADDR`]
//!
//! The forwarding headers are only consulted when no peer address is known
//! (e.g. in-process tests). They are client-controlled and used for logging
//! only, never for any access decision.

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;

/// Fallback value when no address can be determined.
pub const UNKNOWN_ADDR: &str = "unknown";

/// Resolve the caller's address for logging.
///
/// Returns `Cow::Borrowed` for the "unknown" fallback so the common
/// header-less case does not allocate.
#[inline]
pub fn remote_addr<B>(req: &Request<B>) -> Cow<'static, str> {
    if let Some(ConnectInfo(peer)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Cow::Owned(peer.to_string());
    }

    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first) = value.split(',').next().map(str::trim)
        && !first.is_empty()
    {
        return Cow::Owned(first.to_string());
    }

    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
        && !value.trim().is_empty()
    {
        return Cow::Owned(value.trim().to_string());
    }

    Cow::Borrowed(UNKNOWN_ADDR)
}
