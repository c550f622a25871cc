//! User model - global accounts joining farms through memberships.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// User entity as stored. Carries the credential hash and must never be
/// serialized as-is; everything leaving the identity layer goes through
/// [`User::sanitized`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: String,
    pub created_utc: DateTime<Utc>,
}

impl User {
    /// Create a new user. Emails are stored lowercased so invitation
    /// matching and uniqueness are case-insensitive.
    pub fn new(email: &str, display_name: Option<String>, password_hash: String) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            display_name,
            password_hash,
            created_utc: Utc::now(),
        }
    }

    /// Strip the credential hash before the record leaves the resolver.
    pub fn sanitized(&self) -> SanitizedUser {
        SanitizedUser {
            user_id: self.user_id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            created_utc: self.created_utc,
        }
    }
}

/// User representation safe for responses and request extensions.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedUser {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub created_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized_to_lowercase() {
        let user = User::new("  Alice@Example.COM ", None, "hash".into());
        assert_eq!(user.email, "alice@example.com");
    }

    #[test]
    fn sanitized_user_has_no_credential_hash() {
        let user = User::new("a@b.c", Some("A".into()), "secret-hash".into());
        let json = serde_json::to_string(&user.sanitized()).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("password"));
    }
}
