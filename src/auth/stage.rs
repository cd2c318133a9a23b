//! Bearer token authentication and identity header injection.

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use super::token::{TokenClaims, TokenValidator};
use crate::error::AuthError;

/// Header carrying the verified subject id to backends.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the verified role to backends.
pub const USER_ROLE_HEADER: &str = "x-user-role";

const BEARER_PREFIX: &str = "Bearer ";

/// Header edits to apply to the request before it is forwarded.
///
/// Removals are applied first, then insertions (which replace any existing
/// values of the same name).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMutation {
    remove: Vec<HeaderName>,
    insert: Vec<(HeaderName, HeaderValue)>,
}

impl HeaderMutation {
    pub fn remove(mut self, name: HeaderName) -> Self {
        self.remove.push(name);
        self
    }

    pub fn insert(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.insert.push((name, value));
        self
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        for name in &self.remove {
            headers.remove(name);
        }
        for (name, value) in &self.insert {
            headers.insert(name.clone(), value.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.insert.is_empty()
    }
}

/// Identity established for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedContext {
    user_id: Option<String>,
    role: String,
    mutation: HeaderMutation,
}

impl AuthenticatedContext {
    fn from_claims(claims: TokenClaims) -> Result<Self, AuthError> {
        let user_id_header = HeaderName::from_static(USER_ID_HEADER);
        let role_header = HeaderName::from_static(USER_ROLE_HEADER);

        let role_value = HeaderValue::from_str(claims.role()).map_err(|_| {
            AuthError::InvalidSignature("role claim is not a valid header value".into())
        })?;

        // Client-supplied identity headers never reach a backend.
        let mut mutation = HeaderMutation::default()
            .remove(AUTHORIZATION)
            .remove(user_id_header.clone())
            .insert(role_header, role_value);

        if let Some(id) = claims.user_id() {
            let id_value = HeaderValue::from_str(id).map_err(|_| {
                AuthError::InvalidSignature("id claim is not a valid header value".into())
            })?;
            mutation = mutation.insert(user_id_header, id_value);
        }

        Ok(Self {
            user_id: claims.user_id().map(str::to_string),
            role: claims.role().to_string(),
            mutation,
        })
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// Header edits to apply before forwarding.
    pub fn header_mutation(&self) -> &HeaderMutation {
        &self.mutation
    }
}

/// Turns a raw request into an authenticated identity or a rejection.
#[derive(Debug, Clone)]
pub struct AuthenticationStage {
    validator: TokenValidator,
}

impl AuthenticationStage {
    pub fn new(validator: TokenValidator) -> Self {
        Self { validator }
    }

    /// Authenticate from the inbound request headers.
    ///
    /// A missing header or a scheme other than `Bearer ` is rejected before
    /// any token parsing.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedContext, AuthError> {
        let token = extract_bearer(headers)?;
        let claims = self.validator.validate(token)?;
        let context = AuthenticatedContext::from_claims(claims)?;

        debug!(
            user_id = context.user_id().unwrap_or("-"),
            role = context.role(),
            "Caller authenticated"
        );
        Ok(context)
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .ok_or(AuthError::MissingHeader)
}
