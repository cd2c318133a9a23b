//! HMAC-signed JWT verification.
//!
//! # Verification order
//!
//! 1. Signature and structure (`HS256`, `HS384` or `HS512`)
//! 2. Expiry (`exp`, required, compared with zero leeway)
//! 3. Role (`role`, required, non-empty string)
//!
//! The subject id (`id`) is optional. Claims are only ever produced from a
//! token whose signature verified.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult, AuthError};

/// Minimum key length in bytes (256 bits, the HS256 block requirement).
pub const MIN_SECRET_LEN: usize = 32;

const ID_CLAIM: &str = "id";
const ROLE_CLAIM: &str = "role";
const EXP_CLAIM: &str = "exp";

/// Identity extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    user_id: Option<String>,
    role: String,
    expires_at: u64,
}

impl TokenClaims {
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// Expiry as seconds since the Unix epoch.
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }
}

/// Verifies bearer tokens against the process-wide signing key.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Create a validator for the given shared secret.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: &[u8]) -> AppResult<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AppError::ConfigError(format!(
                "JWT_SECRET must be at least {MIN_SECRET_LEN} bytes, got {}",
                secret.len()
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.leeway = 0;
        // Expiry is checked against an explicit clock in `validate_at`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&[EXP_CLAIM]);

        Ok(Self {
            key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    /// Validate a token against the current system time.
    pub fn validate(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AuthError::Internal(format!("system clock before epoch: {e}")))?
            .as_secs();
        self.validate_at(token, now)
    }

    /// Validate a token against an explicit clock (seconds since epoch).
    pub fn validate_at(&self, token: &str, now: u64) -> Result<TokenClaims, AuthError> {
        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation)
            .map_err(classify_decode_error)?;
        let claims = data.claims;

        // `decode` has already rejected an `exp` that is not an integer.
        let expires_at = claims
            .get(EXP_CLAIM)
            .and_then(Value::as_u64)
            .ok_or_else(|| AuthError::InvalidSignature("exp claim is not a NumericDate".into()))?;
        if now >= expires_at {
            return Err(AuthError::Expired);
        }

        let role = match claims.get(ROLE_CLAIM) {
            Some(Value::String(role)) if !role.is_empty() => role.clone(),
            _ => return Err(AuthError::MissingRole),
        };

        let user_id = match claims.get(ID_CLAIM) {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(_) => {
                return Err(AuthError::InvalidSignature("id claim is not a string".into()));
            }
        };

        Ok(TokenClaims {
            user_id,
            role,
            expires_at,
        })
    }
}

fn classify_decode_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidEcdsaKey
        | ErrorKind::RsaFailedSigning
        | ErrorKind::Crypto(_) => AuthError::Internal(err.to_string()),
        _ => AuthError::InvalidSignature(err.to_string()),
    }
}
