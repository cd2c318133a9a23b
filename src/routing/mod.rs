//! Path-convention routing to backend services.
//!
//! Requests are addressed as `/api/{service}/{rest...}`. The `{service}`
//! segment selects a [`RouteDefinition`] from the immutable [`RouteTable`];
//! [`ServiceRouter::resolve`] turns the inbound path into a concrete
//! [`RouteMatch`] (target URL, rewritten path, headers to add, deadline).

pub mod router;
pub mod table;

pub use router::{RouteMatch, ServiceRouter};
pub use table::{GATEWAY_SOURCE_HEADER, RewritePolicy, RouteDefinition, RouteTable};
