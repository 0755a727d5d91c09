use crate::api::resources::AppState;
use crate::error::{AppError, Result};
use crate::services::auth::Claims;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

fn bearer_token(parts: &Parts) -> Option<&str> {
    // Authorization header first, query parameter as a fallback for SSE
    // (EventSource can't send custom headers).
    parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| {
            parts.uri.query().and_then(|q| {
                q.split('&')
                    .find(|p| p.starts_with("token="))
                    .and_then(|p| p.strip_prefix("token="))
            })
        })
}

pub struct RequireAuth(pub Claims);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;
        let claims = state.auth_service.verify_token(token).await?;

        Ok(RequireAuth(claims))
    }
}

/// Like `RequireAuth`, but an absent or expired token yields `None` instead
/// of rejecting. The resources flow needs to run even for unauthenticated
/// callers so it can hand back the login redirect action.
pub struct MaybeAuth(pub Option<Claims>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self> {
        let claims = match bearer_token(parts) {
            Some(token) => state.auth_service.verify_token(token).await.ok(),
            None => None,
        };

        Ok(MaybeAuth(claims))
    }
}
