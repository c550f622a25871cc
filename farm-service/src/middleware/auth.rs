//! Authentication middleware: credential verification and identity resolution.
//!
//! Stage one and two of the guard pipeline. Runs before any farm scoping:
//! verifies the bearer token, then resolves the subject to a live account.
//! A subject that no longer resolves is reported exactly like a bad token.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use farm_core::error::AppError;

use crate::models::SanitizedUser;
use crate::AppState;

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::InvalidCredential)?;

    let claims = state.jwt.validate_access_token(token)?;

    let user = state
        .store
        .find_user_by_id(claims.sub)
        .await?
        .ok_or(AppError::InvalidCredential)?;

    // Only the sanitized record travels with the request.
    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(user.sanitized());

    Ok(next.run(req).await)
}

/// Extractor for the authenticated user in handlers behind `auth_middleware`.
pub struct AuthUser(pub SanitizedUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts.extensions.get::<SanitizedUser>().cloned().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "AuthUser extracted outside auth_middleware"
            ))
        })?;

        Ok(AuthUser(user))
    }
}
