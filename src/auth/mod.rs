//! Caller authentication.
//!
//! The gateway establishes identity only. A bearer token is verified by
//! [`TokenValidator`]; [`AuthenticationStage`] turns the verified claims into
//! the identity headers backends rely on for their own authorization.
//!
//! ```text
//! Authorization: Bearer <jwt>
//!        │
//!        ▼
//!  AuthenticationStage ──► TokenValidator (signature → exp → role)
//!        │
//!        ▼
//!  X-User-Id / X-User-Role added, Authorization removed
//! ```

pub mod stage;
pub mod token;

pub use stage::{
    AuthenticatedContext, AuthenticationStage, HeaderMutation, USER_ID_HEADER, USER_ROLE_HEADER,
    extract_bearer,
};
pub use token::{MIN_SECRET_LEN, TokenClaims, TokenValidator};
