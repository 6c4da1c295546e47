//! Bearer token extraction.
//!
//! When `AUTH_SECRET` is configured every request must carry it as
//! `Authorization: Bearer <secret>`. Without one the server is open, which
//! is meant for local development only.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::AppState;

/// A request that passed the API key check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthUser {
    /// Presented the configured key
    Device,
    /// No key is configured
    Anonymous,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(secret) = state.config.auth_secret.as_deref() else {
            return Ok(AuthUser::Anonymous);
        };

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized("Missing authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized("Invalid authorization header format"))?;

        if token.is_empty() {
            return Err(AppError::Unauthorized("Empty bearer token"));
        }
        if token != secret {
            tracing::warn!("Rejected request with an unknown API key");
            return Err(AppError::Unauthorized("Invalid API key"));
        }

        Ok(AuthUser::Device)
    }
}
