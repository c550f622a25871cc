//! Registration and login.

use axum::{extract::State, http::StatusCode, Json};
use farm_core::error::AppError;
use serde::Deserialize;
use validator::Validate;

use crate::models::User;
use crate::services::TokenResponse;
use crate::utils::{hash_password, verify_password, ValidatedJson};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(max = 100))]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// POST /auth/register
#[tracing::instrument(skip_all, fields(email = %req.email))]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    let password_hash = hash_password(&req.password).map_err(AppError::InternalError)?;
    let user = User::new(&req.email, req.display_name, password_hash);

    state.store.insert_user(&user).await?;

    tracing::info!(user_id = %user.user_id, "User registered");

    let access_token = state.jwt.generate_access_token(user.user_id, &user.email)?;

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: state.jwt.access_token_expiry_seconds(),
        }),
    ))
}

/// POST /auth/login
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let email = req.email.trim().to_lowercase();

    // A missing account and a wrong password fail identically.
    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or(AppError::InvalidCredential)?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(AppError::InvalidCredential);
    }

    let access_token = state.jwt.generate_access_token(user.user_id, &user.email)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_token_expiry_seconds(),
    }))
}
