//! Invitation workflow: issue, preview, accept.
//!
//! Invitations are stateless signed tokens. Everything an invitation binds
//! (farm, invited email, target role, expiry) travels in the token itself;
//! the preview endpoint is the sole source of displayed invitation details.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use farm_core::error::AppError;
use farm_core::permissions::Permission;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::middleware::{AuthUser, FarmActor};
use crate::models::{FarmMembership, SanitizedUser};
use crate::utils::ValidatedJson;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvitationRequest {
    #[validate(email)]
    pub email: String,
    pub role_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct InvitationIssuedResponse {
    /// True when the invited email already belongs to a member of this farm;
    /// no token is issued and no email is sent in that case.
    pub already_member: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct InvitationDetailsResponse {
    pub farm_id: Uuid,
    pub farm_name: String,
    pub invited_email: String,
    pub role_name: String,
    pub expires_at: DateTime<Utc>,
    /// Whether the account at the invited email (if any) already belongs to
    /// the farm.
    pub already_member: bool,
    /// True when no account exists for the invited email yet.
    pub requires_registration: bool,
    /// Present when the request carried a valid bearer token: whether that
    /// caller's email matches the invited email. Clients use it to warn
    /// about being logged in as someone else.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_email_matches: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct InvitationAcceptedResponse {
    pub farm_id: Uuid,
    pub farm_name: String,
    pub role_id: Uuid,
    pub already_member: bool,
}

/// POST /invitations — requires `FARM_MEMBER_INVITE` in the current farm.
#[tracing::instrument(skip_all, fields(farm_id = %actor.farm_id()))]
pub async fn create_invitation(
    State(state): State<AppState>,
    actor: FarmActor,
    ValidatedJson(req): ValidatedJson<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<InvitationIssuedResponse>), AppError> {
    actor.require(Permission::FarmMemberInvite)?;

    let farm_id = actor.farm_id();
    let invited_email = req.email.trim().to_lowercase();

    let role = state
        .store
        .find_role_by_id(req.role_id)
        .await?
        .filter(|r| r.farm_id == farm_id)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Role not found in this farm")))?;

    let farm = state
        .store
        .find_farm_by_id(farm_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Farm not found")))?;

    // Inviting an existing member is not an error; report it and stop.
    if let Some(account) = state.store.find_user_by_email(&invited_email).await? {
        if state
            .store
            .find_membership(account.user_id, farm_id)
            .await?
            .is_some()
        {
            return Ok((
                StatusCode::OK,
                Json(InvitationIssuedResponse {
                    already_member: true,
                    invite_token: None,
                    invite_url: None,
                    expires_at: None,
                }),
            ));
        }
    }

    let expires_at = Utc::now() + Duration::days(state.config.invitation.expiry_days);
    let token = state
        .jwt
        .generate_invitation_token(farm_id, &invited_email, role.role_id, expires_at)?;
    let invite_url = format!(
        "{}/invitations/{}",
        state.config.security.public_base_url.trim_end_matches('/'),
        token
    );

    state
        .email
        .send_invitation_email(&invited_email, &farm.name, &invite_url, expires_at)
        .await?;

    tracing::info!(role_id = %role.role_id, "Invitation issued");

    Ok((
        StatusCode::CREATED,
        Json(InvitationIssuedResponse {
            already_member: false,
            invite_token: Some(token),
            invite_url: Some(invite_url),
            expires_at: Some(expires_at),
        }),
    ))
}

/// GET /invitations/{token}/details
///
/// Public endpoint: a bearer token is optional and only sharpens the
/// `already_member` answer. Invalid bearers are ignored rather than
/// rejected, since the invitee may be logged out or not registered at all.
pub async fn invitation_details(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Result<Json<InvitationDetailsResponse>, AppError> {
    let claims = state.jwt.validate_invitation_token(&token)?;

    // The token outliving its farm or role counts as an expired invitation.
    let farm = state
        .store
        .find_farm_by_id(claims.farm_id)
        .await?
        .ok_or(AppError::InvalidOrExpiredInvitation)?;
    let role = state
        .store
        .find_role_by_id(claims.role_id)
        .await?
        .filter(|r| r.farm_id == claims.farm_id)
        .ok_or(AppError::InvalidOrExpiredInvitation)?;

    let account = state.store.find_user_by_email(&claims.email).await?;
    let already_member = match &account {
        Some(account) => state
            .store
            .find_membership(account.user_id, claims.farm_id)
            .await?
            .is_some(),
        None => false,
    };

    let caller = optional_bearer_user(&state, &headers).await;
    let caller_email_matches = caller.map(|c| c.email == claims.email);

    Ok(Json(InvitationDetailsResponse {
        farm_id: claims.farm_id,
        farm_name: farm.name,
        invited_email: claims.email,
        role_name: role.name,
        expires_at: expiry_instant(claims.exp),
        already_member,
        requires_registration: account.is_none(),
        caller_email_matches,
    }))
}

/// POST /invitations/{token}/accept — requires a valid bearer token; the
/// authenticated account's email must match the invited email.
#[tracing::instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn accept_invitation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(token): Path<String>,
) -> Result<(StatusCode, Json<InvitationAcceptedResponse>), AppError> {
    let claims = state.jwt.validate_invitation_token(&token)?;

    // Both sides are stored/issued lowercased, so this comparison is
    // case-insensitive by construction.
    if user.email != claims.email {
        return Err(AppError::InvitationEmailMismatch);
    }

    let farm = state
        .store
        .find_farm_by_id(claims.farm_id)
        .await?
        .ok_or(AppError::InvalidOrExpiredInvitation)?;
    let role = state
        .store
        .find_role_by_id(claims.role_id)
        .await?
        .filter(|r| r.farm_id == claims.farm_id)
        .ok_or(AppError::InvalidOrExpiredInvitation)?;

    let membership = FarmMembership::new(claims.farm_id, user.user_id, role.role_id);
    let inserted = state.store.insert_membership_if_absent(&membership).await?;

    if inserted {
        tracing::info!(farm_id = %claims.farm_id, "Invitation accepted");
    }

    let status = if inserted { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(InvitationAcceptedResponse {
            farm_id: claims.farm_id,
            farm_name: farm.name,
            role_id: role.role_id,
            already_member: !inserted,
        }),
    ))
}

fn expiry_instant(exp: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(exp, 0).single().unwrap_or_else(Utc::now)
}

async fn optional_bearer_user(state: &AppState, headers: &HeaderMap) -> Option<SanitizedUser> {
    let token = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?;
    let claims = state.jwt.validate_access_token(token).ok()?;
    let user = state.store.find_user_by_id(claims.sub).await.ok()??;
    Some(user.sanitized())
}
