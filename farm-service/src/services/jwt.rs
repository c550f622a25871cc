use chrono::{DateTime, Duration, Utc};
use farm_core::error::AppError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;

/// Marker claim distinguishing invitation tokens from access tokens so one
/// can never be replayed as the other.
const INVITATION_PURPOSE: &str = "farm_invitation";

/// JWT service for token generation and verification.
///
/// Tokens are signed with HS256 using the server-held secret. Expiry is
/// checked manually with an inclusive boundary: a token presented exactly at
/// its expiry instant is already expired.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
}

/// Claims for bearer access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Email at issuance time (informational; identity is re-resolved per request)
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    pub jti: String,
}

/// Claims for invitation tokens. Invitations are stateless: the signed token
/// is the whole record binding (farm, invited email, target role, expiry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationClaims {
    pub farm_id: Uuid,
    /// Invited email, lowercased at issuance.
    pub email: String,
    pub role_id: Uuid,
    pub exp: i64,
    pub iat: i64,
    pub purpose: String,
}

/// Token response returned to the client on register/login.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
        }
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(&self, user_id: Uuid, email: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: user_id,
            email: email.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode access token: {}", e)))
    }

    /// Verify an access token: signature, shape, then inclusive expiry.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, AppError> {
        let claims: AccessTokenClaims = self
            .decode_claims(token)
            .map_err(|_| AppError::InvalidCredential)?;

        if is_expired_at(claims.exp, Utc::now().timestamp()) {
            return Err(AppError::ExpiredCredential);
        }

        Ok(claims)
    }

    /// Generate a signed invitation token with an explicit expiry instant.
    pub fn generate_invitation_token(
        &self,
        farm_id: Uuid,
        email: &str,
        role_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = InvitationClaims {
            farm_id,
            email: email.trim().to_lowercase(),
            role_id,
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
            purpose: INVITATION_PURPOSE.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to encode invitation token: {}", e))
        })
    }

    /// Verify an invitation token. Bad signature, wrong shape, wrong purpose
    /// and expiry all collapse into `InvalidOrExpiredInvitation`.
    pub fn validate_invitation_token(&self, token: &str) -> Result<InvitationClaims, AppError> {
        let claims: InvitationClaims = self
            .decode_claims(token)
            .map_err(|_| AppError::InvalidOrExpiredInvitation)?;

        if claims.purpose != INVITATION_PURPOSE {
            return Err(AppError::InvalidOrExpiredInvitation);
        }
        if is_expired_at(claims.exp, Utc::now().timestamp()) {
            return Err(AppError::InvalidOrExpiredInvitation);
        }

        Ok(claims)
    }

    fn decode_claims<T: serde::de::DeserializeOwned>(
        &self,
        token: &str,
    ) -> Result<T, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by the caller so the inclusive boundary is ours,
        // not the library's leeway-based one.
        validation.validate_exp = false;

        decode::<T>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }
}

/// Inclusive expiry check: a token is expired from its expiry instant on.
fn is_expired_at(exp: i64, now: i64) -> bool {
    now >= exp
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn test_service() -> JwtService {
        JwtService::new(&JwtConfig {
            secret: Secret::new("test-signing-secret".to_string()),
            access_token_expiry_minutes: 15,
        })
    }

    #[test]
    fn access_token_round_trip() {
        let jwt = test_service();
        let user_id = Uuid::new_v4();
        let token = jwt.generate_access_token(user_id, "a@b.c").unwrap();
        let claims = jwt.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "a@b.c");
    }

    #[test]
    fn tampered_token_is_invalid_credential() {
        let jwt = test_service();
        let token = jwt.generate_access_token(Uuid::new_v4(), "a@b.c").unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        let err = jwt.validate_access_token(&tampered).unwrap_err();
        assert!(matches!(err, AppError::InvalidCredential));

        let err = jwt.validate_access_token("not-a-jwt").unwrap_err();
        assert!(matches!(err, AppError::InvalidCredential));
    }

    #[test]
    fn wrong_secret_is_invalid_credential() {
        let jwt = test_service();
        let other = JwtService::new(&JwtConfig {
            secret: Secret::new("a-different-secret".to_string()),
            access_token_expiry_minutes: 15,
        });
        let token = other.generate_access_token(Uuid::new_v4(), "a@b.c").unwrap();
        assert!(matches!(
            jwt.validate_access_token(&token).unwrap_err(),
            AppError::InvalidCredential
        ));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let exp = 1_700_000_000;
        assert!(!is_expired_at(exp, exp - 1));
        assert!(is_expired_at(exp, exp));
        assert!(is_expired_at(exp, exp + 1));
    }

    #[test]
    fn invitation_round_trip() {
        let jwt = test_service();
        let farm_id = Uuid::new_v4();
        let role_id = Uuid::new_v4();
        let token = jwt
            .generate_invitation_token(
                farm_id,
                "Invitee@Example.com",
                role_id,
                Utc::now() + Duration::days(7),
            )
            .unwrap();
        let claims = jwt.validate_invitation_token(&token).unwrap();
        assert_eq!(claims.farm_id, farm_id);
        assert_eq!(claims.role_id, role_id);
        assert_eq!(claims.email, "invitee@example.com");
    }

    #[test]
    fn expired_invitation_is_rejected() {
        let jwt = test_service();
        let token = jwt
            .generate_invitation_token(
                Uuid::new_v4(),
                "a@b.c",
                Uuid::new_v4(),
                Utc::now() - Duration::seconds(1),
            )
            .unwrap();
        assert!(matches!(
            jwt.validate_invitation_token(&token).unwrap_err(),
            AppError::InvalidOrExpiredInvitation
        ));

        // Exactly at expiry counts as expired too.
        let token = jwt
            .generate_invitation_token(Uuid::new_v4(), "a@b.c", Uuid::new_v4(), Utc::now())
            .unwrap();
        assert!(matches!(
            jwt.validate_invitation_token(&token).unwrap_err(),
            AppError::InvalidOrExpiredInvitation
        ));
    }

    #[test]
    fn access_token_is_not_an_invitation() {
        let jwt = test_service();
        let token = jwt.generate_access_token(Uuid::new_v4(), "a@b.c").unwrap();
        assert!(matches!(
            jwt.validate_invitation_token(&token).unwrap_err(),
            AppError::InvalidOrExpiredInvitation
        ));
    }

    #[test]
    fn invitation_is_not_an_access_token() {
        let jwt = test_service();
        let token = jwt
            .generate_invitation_token(
                Uuid::new_v4(),
                "a@b.c",
                Uuid::new_v4(),
                Utc::now() + Duration::days(1),
            )
            .unwrap();
        assert!(matches!(
            jwt.validate_access_token(&token).unwrap_err(),
            AppError::InvalidCredential
        ));
    }
}
