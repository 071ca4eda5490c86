use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;

/// Caller identity from the `Authorization: Bearer <token>` header.
///
/// A missing header yields an anonymous identity so the access policy decides
/// how to respond. A header that is present but malformed, forged or expired is
/// rejected here with `TOKEN_INVALID`.
#[derive(Debug, Clone, Default)]
pub struct Identity(pub Option<String>);

impl Identity {
    pub fn login(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(auth_header) = parts.headers.get("Authorization") else {
            return Ok(Identity(None));
        };

        let token = auth_header
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::TokenInvalid)?;

        let claims = jwt::verify(token, &state.config.auth.jwt_secret).map_err(|e| {
            tracing::debug!("Rejected session token: {e}");
            AppError::TokenInvalid
        })?;

        Ok(Identity(Some(claims.sub)))
    }
}
