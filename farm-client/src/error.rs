use thiserror::Error;

/// Client-side error taxonomy.
///
/// `Api` carries the server's machine-readable reason code so callers can
/// route on it (`not_a_farm_member` → farm picker, `missing_permission` →
/// access denied, `invalid_credential` → re-login).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        reason: String,
        message: String,
    },

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("No farm selected")]
    NoFarmSelected,

    #[error("Unexpected response shape: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    /// The server's reason code, if this is an API error.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ClientError::Api { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Whether the caller should re-authenticate.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ClientError::Api { status: 401, .. })
    }
}
