use crate::error::{AppError, Result};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

/// A verified platform identity: stable numeric user id plus role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub role: Role,
}

/// Validates an opaque bearer credential and yields the identity behind it.
///
/// Credential issuance is owned by the platform's auth subsystem; this core
/// only consumes tokens, both at the request layer (Authorization header)
/// and at the gateway handshake (query token).
pub trait IdentityVerifier: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns `AppError::Auth` if the credential is missing, malformed,
    /// expired, or otherwise invalid.
    fn verify(&self, token: &str) -> Result<Identity>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: Role,
    pub exp: usize,
}

/// HS256 verifier over the platform's shared signing secret.
#[derive(Clone)]
pub struct JwtVerifier {
    secret: String,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier").finish_non_exhaustive()
    }
}

impl JwtVerifier {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Issues a token for the given identity. Used by tests and local
    /// tooling; production tokens come from the auth subsystem.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if signing fails.
    pub fn issue(&self, identity: Identity, ttl_secs: u64) -> Result<String> {
        let exp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(std::time::Duration::from_secs(0))
            .as_secs() as usize
            + ttl_secs as usize;

        let claims = Claims { sub: identity.id, role: identity.role, exp };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret.as_bytes()))
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Identity> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Auth)?;

        Ok(Identity { id: token_data.claims.sub, role: token_data.claims.role })
    }
}
