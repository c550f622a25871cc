use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Application error taxonomy.
///
/// Authentication failures (401) are deliberately uniform towards the client:
/// a bad signature, a malformed token and a subject that no longer resolves
/// all surface as `invalid_credential` so account existence never leaks.
/// Tenancy and permission failures (403) each carry a distinct machine-readable
/// reason code so clients can route to farm selection vs. access denied.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Expired credential")]
    ExpiredCredential,

    #[error("No farm selected")]
    NoFarmSelected,

    #[error("Not a member of the selected farm")]
    NotAFarmMember,

    #[error("Missing permission: {0}")]
    MissingPermission(String),

    #[error("Invalid or expired invitation")]
    InvalidOrExpiredInvitation,

    #[error("Invitation was issued for a different account")]
    InvitationEmailMismatch,

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    /// Stable machine-readable reason code for the client.
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidCredential => "invalid_credential",
            AppError::ExpiredCredential => "expired_credential",
            AppError::NoFarmSelected => "no_farm_selected",
            AppError::NotAFarmMember => "not_a_farm_member",
            AppError::MissingPermission(_) => "missing_permission",
            AppError::InvalidOrExpiredInvitation => "invalid_or_expired_invitation",
            AppError::InvitationEmailMismatch => "invitation_email_mismatch",
            AppError::Conflict(_) => "conflict",
            AppError::InternalError(_) => "internal_error",
            AppError::DatabaseError(_) => "database_error",
            AppError::EmailError(_) => "email_error",
            AppError::ConfigError(_) => "config_error",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredCredential,
            _ => AppError::InvalidCredential,
        }
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::EmailError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

/// Standard JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let reason = self.reason();

        let (status, error_message, details) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation error".to_string(),
                Some(err.to_string()),
            ),
            AppError::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string(), None),
            AppError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string(), None),
            AppError::InvalidCredential | AppError::ExpiredCredential => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
                None,
            ),
            AppError::NoFarmSelected => (
                StatusCode::FORBIDDEN,
                "No farm selected and no farm membership found".to_string(),
                None,
            ),
            AppError::NotAFarmMember => (
                StatusCode::FORBIDDEN,
                "Not a member of the selected farm".to_string(),
                None,
            ),
            AppError::MissingPermission(perm) => (
                StatusCode::FORBIDDEN,
                format!("Access denied: missing permission {}", perm),
                None,
            ),
            AppError::InvalidOrExpiredInvitation => (
                StatusCode::GONE,
                "Invitation is invalid or has expired".to_string(),
                None,
            ),
            AppError::InvitationEmailMismatch => (
                StatusCode::FORBIDDEN,
                "Invitation was issued for a different account".to_string(),
                None,
            ),
            AppError::Conflict(err) => (StatusCode::CONFLICT, err.to_string(), None),
            AppError::InternalError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                Some(format!("{:#}", err)),
            ),
            AppError::DatabaseError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                Some(err.to_string()),
            ),
            AppError::EmailError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Email error".to_string(),
                Some(msg),
            ),
            AppError::ConfigError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
                Some(err.to_string()),
            ),
        };

        (
            status,
            Json(ErrorBody {
                error: error_message,
                reason,
                details,
            }),
        )
            .into_response()
    }
}
