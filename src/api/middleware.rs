use crate::api::AppState;
use crate::auth::Role;
use crate::error::AppError;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

/// Authenticated request identity, extracted from the Bearer header and
/// validated by the identity verifier.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: Role,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts.headers.get(header::AUTHORIZATION).ok_or(AppError::Auth)?;

        let auth_str = auth_header.to_str().map_err(|_| AppError::Auth)?;
        let token = auth_str.strip_prefix("Bearer ").ok_or(AppError::Auth)?;

        let identity = state.verifier.verify(token)?;

        Ok(Self { user_id: identity.id, role: identity.role })
    }
}
