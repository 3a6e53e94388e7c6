//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::models::Claims;
use super::token::TokenError;
use crate::common::{safe_email_log, ApiError, AppState};

/// Claims of a validated session token taken from `Authorization: Bearer <jwt>`
///
/// Rejects with `TOKEN_EXPIRED` or `INVALID_TOKEN` so callers can tell a stale
/// session from a forged one.
#[derive(Debug)]
pub struct SessionUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(app_state): Extension<Arc<AppState>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                warn!("Authentication failed: missing Authorization header");
                ApiError::Unauthorized("missing auth".to_string())
            })?;

        // Handle "Bearer <token>" format or raw token
        let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();

        match app_state.tokens.decode(token) {
            Ok(claims) => {
                debug!(email = %safe_email_log(&claims.sub.email), "Session token accepted");
                Ok(SessionUser(claims))
            }
            Err(TokenError::TokenExpired) => {
                warn!("Session token expired");
                Err(ApiError::TokenExpired)
            }
            Err(e) => {
                warn!(error = %e, "Session token rejected");
                Err(ApiError::InvalidToken)
            }
        }
    }
}
