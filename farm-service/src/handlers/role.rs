//! Role administration within the current farm. Every route here requires
//! `FARM_ROLE_MANAGE`.

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

use crate::middleware::FarmActor;
use crate::models::Role;
use crate::utils::ValidatedJson;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role_id: Uuid,
    pub name: String,
    pub version: i64,
    pub permissions: Vec<String>,
}

impl RoleResponse {
    fn from_parts(role: Role, permissions: Vec<Permission>) -> Self {
        let mut permissions: Vec<String> =
            permissions.iter().map(|p| p.as_str().to_string()).collect();
        permissions.sort();
        Self {
            role_id: role.role_id,
            name: role.name,
            version: role.version,
            permissions,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 60))]
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
pub struct GrantPermissionRequest {
    pub permission: Permission,
}

/// GET /farms/current/roles
pub async fn list_roles(
    State(state): State<AppState>,
    actor: FarmActor,
) -> Result<Json<Vec<RoleResponse>>, AppError> {
    actor.require(Permission::FarmRoleManage)?;

    let roles = state.store.find_roles_for_farm(actor.farm_id()).await?;

    let mut out = Vec::with_capacity(roles.len());
    for role in roles {
        let permissions = state.store.get_role_permissions(role.role_id).await?;
        out.push(RoleResponse::from_parts(role, permissions));
    }

    Ok(Json(out))
}

/// POST /farms/current/roles
#[tracing::instrument(skip_all, fields(farm_id = %actor.farm_id(), role_name = %req.name))]
pub async fn create_role(
    State(state): State<AppState>,
    actor: FarmActor,
    ValidatedJson(req): ValidatedJson<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleResponse>), AppError> {
    actor.require(Permission::FarmRoleManage)?;

    let name = req.name.trim().to_string();
    let existing = state.store.find_roles_for_farm(actor.farm_id()).await?;
    if existing.iter().any(|r| r.name.eq_ignore_ascii_case(&name)) {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "A role named '{}' already exists in this farm",
            name
        )));
    }

    let role = Role::new(actor.farm_id(), name);
    state.store.insert_role(&role, &req.permissions).await?;

    tracing::info!(role_id = %role.role_id, "Role created");

    Ok((
        StatusCode::CREATED,
        Json(RoleResponse::from_parts(role, req.permissions)),
    ))
}

/// POST /farms/current/roles/{role_id}/permissions
///
/// Grants take effect on the next request of every member holding the role;
/// the version bump invalidates cached permission sets.
#[tracing::instrument(skip_all, fields(farm_id = %actor.farm_id(), role_id = %role_id))]
pub async fn grant_permission(
    State(state): State<AppState>,
    actor: FarmActor,
    Path(role_id): Path<Uuid>,
    Json(req): Json<GrantPermissionRequest>,
) -> Result<Json<RoleResponse>, AppError> {
    actor.require(Permission::FarmRoleManage)?;
    ensure_role_in_farm(&state, role_id, actor.farm_id()).await?;

    let role = state.store.grant_permission(role_id, req.permission).await?;
    let permissions = state.store.get_role_permissions(role_id).await?;

    tracing::info!(permission = %req.permission, "Permission granted to role");

    Ok(Json(RoleResponse::from_parts(role, permissions)))
}

/// DELETE /farms/current/roles/{role_id}/permissions/{permission}
#[tracing::instrument(skip_all, fields(farm_id = %actor.farm_id(), role_id = %role_id))]
pub async fn revoke_permission(
    State(state): State<AppState>,
    actor: FarmActor,
    Path((role_id, permission)): Path<(Uuid, String)>,
) -> Result<Json<RoleResponse>, AppError> {
    actor.require(Permission::FarmRoleManage)?;
    ensure_role_in_farm(&state, role_id, actor.farm_id()).await?;

    let permission: Permission = permission
        .parse()
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("{}", e)))?;

    let role = state.store.revoke_permission(role_id, permission).await?;
    let permissions = state.store.get_role_permissions(role_id).await?;

    tracing::info!(permission = %permission, "Permission revoked from role");

    Ok(Json(RoleResponse::from_parts(role, permissions)))
}

/// Roles are farm-scoped; a role id from another farm is indistinguishable
/// from a missing one.
async fn ensure_role_in_farm(state: &AppState, role_id: Uuid, farm_id: Uuid) -> Result<(), AppError> {
    match state.store.find_role_by_id(role_id).await? {
        Some(role) if role.farm_id == farm_id => Ok(()),
        _ => Err(AppError::NotFound(anyhow::anyhow!(
            "Role not found in this farm"
        ))),
    }
}
