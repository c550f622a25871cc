//! User profile handlers.

use axum::Json;

use crate::middleware::AuthUser;
use crate::models::SanitizedUser;

/// GET /users/me
pub async fn get_me(AuthUser(user): AuthUser) -> Json<SanitizedUser> {
    Json(user)
}
