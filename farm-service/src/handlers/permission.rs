//! Permission introspection for the current farm scope.

use axum::Json;
use farm_core::error::AppError;
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::FarmActor;

#[derive(Debug, Serialize)]
pub struct CurrentPermissionsResponse {
    pub farm_id: Uuid,
    pub role_id: Uuid,
    /// Granted permissions, sorted, as wire strings (e.g. `FIELD_CREATE`).
    pub permissions: Vec<String>,
}

/// GET /farms/current/permissions
///
/// The client permission mirror refreshes from this endpoint on login and on
/// farm switch. Membership alone is enough; no specific permission gates it.
pub async fn current_permissions(actor: FarmActor) -> Result<Json<CurrentPermissionsResponse>, AppError> {
    Ok(Json(CurrentPermissionsResponse {
        farm_id: actor.farm_id(),
        role_id: actor.farm.membership.role_id,
        permissions: actor.farm.permissions.to_sorted_strings(),
    }))
}
