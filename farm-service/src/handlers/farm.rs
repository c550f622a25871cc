//! Farm creation, listing, and member administration.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use farm_core::error::AppError;
use farm_core::permissions::Permission;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::middleware::{AuthUser, FarmActor};
use crate::models::{default_farm_roles, Farm};
use crate::services::{FarmSummary, MemberRecord};
use crate::utils::ValidatedJson;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFarmRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateFarmResponse {
    pub farm: Farm,
    /// The creator's role in the new farm (always the seeded Owner role).
    pub role_id: Uuid,
}

/// POST /farms
///
/// Creates the farm with its default roles and makes the caller its Owner,
/// all in one transaction.
#[tracing::instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn create_farm(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateFarmRequest>,
) -> Result<(StatusCode, Json<CreateFarmResponse>), AppError> {
    let farm = Farm::new(req.name.trim().to_string(), user.user_id);
    let seeds = default_farm_roles();

    let membership = state.store.create_farm(&farm, &seeds, user.user_id).await?;

    tracing::info!(farm_id = %farm.farm_id, "Farm created");

    Ok((
        StatusCode::CREATED,
        Json(CreateFarmResponse {
            farm,
            role_id: membership.role_id,
        }),
    ))
}

/// GET /farms — the caller's farms, earliest-joined first.
pub async fn list_farms(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<FarmSummary>>, AppError> {
    let farms = state.store.list_farms_for_user(user.user_id).await?;
    Ok(Json(farms))
}

/// GET /farms/current/members
pub async fn list_members(
    State(state): State<AppState>,
    actor: FarmActor,
) -> Result<Json<Vec<MemberRecord>>, AppError> {
    actor.require(Permission::FarmMemberRead)?;

    let members = state.store.list_farm_members(actor.farm_id()).await?;
    Ok(Json(members))
}

/// DELETE /farms/current/members/{user_id}
///
/// Removing the last member whose role can remove members would strand the
/// farm, so that removal is rejected. Self-removal is allowed under the same
/// rule. The store performs the check and the delete atomically.
#[tracing::instrument(skip_all, fields(farm_id = %actor.farm_id(), target = %target_user_id))]
pub async fn remove_member(
    State(state): State<AppState>,
    actor: FarmActor,
    Path(target_user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    actor.require(Permission::FarmMemberRemove)?;

    let removed = state
        .store
        .remove_member_guarded(actor.farm_id(), target_user_id, Permission::FarmMemberRemove)
        .await?;
    if !removed {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Member not found in this farm"
        )));
    }

    tracing::info!("Member removed from farm");

    Ok(StatusCode::NO_CONTENT)
}
