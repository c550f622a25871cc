//! Farm context middleware: farm selection and permission resolution.
//!
//! Stages three and four of the guard pipeline, applied after
//! `auth_middleware`. Handlers behind it receive a [`FarmActor`] and check
//! their own required permission via [`FarmActor::require`]; the
//! route→permission mapping lives with each handler, not here.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use farm_core::error::AppError;
use farm_core::permissions::{Permission, PermissionSet};
use uuid::Uuid;

use crate::models::{FarmMembership, SanitizedUser};
use crate::AppState;

/// Per-request farm selector header. Absent means the default-farm policy:
/// the caller's earliest-joined farm (ties broken by farm id).
pub const SELECTED_FARM_HEADER: &str = "x-selected-farm-id";

/// Resolved farm scope for the current request.
#[derive(Clone)]
pub struct FarmContext {
    pub farm_id: Uuid,
    pub membership: FarmMembership,
    pub permissions: Arc<PermissionSet>,
}

pub async fn farm_context_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = req
        .extensions()
        .get::<SanitizedUser>()
        .cloned()
        .ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "farm_context_middleware applied without auth_middleware"
            ))
        })?;

    let selector = req
        .headers()
        .get(SELECTED_FARM_HEADER)
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|s| Uuid::parse_str(s.trim()).ok())
                .ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!(
                        "Invalid {} header",
                        SELECTED_FARM_HEADER
                    ))
                })
        })
        .transpose()?;

    let membership = match selector {
        Some(farm_id) => state
            .store
            .find_membership(user.user_id, farm_id)
            .await?
            .ok_or(AppError::NotAFarmMember)?,
        None => {
            // Deterministic default: the store returns memberships ordered by
            // (joined_utc, farm_id), so the first one is the earliest-joined.
            let mut memberships = state.store.find_memberships_for_user(user.user_id).await?;
            if memberships.is_empty() {
                return Err(AppError::NoFarmSelected);
            }
            memberships.remove(0)
        }
    };

    let permissions = state.permissions.resolve(&membership).await?;

    req.extensions_mut().insert(FarmContext {
        farm_id: membership.farm_id,
        membership,
        permissions,
    });

    Ok(next.run(req).await)
}

/// The authenticated user acting inside a resolved farm scope.
pub struct FarmActor {
    pub user: SanitizedUser,
    pub farm: FarmContext,
}

impl FarmActor {
    pub fn farm_id(&self) -> Uuid {
        self.farm.farm_id
    }

    /// Check that the caller's resolved set grants `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.farm.permissions.contains(permission) {
            Ok(())
        } else {
            Err(AppError::MissingPermission(permission.as_str().to_string()))
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for FarmActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts.extensions.get::<SanitizedUser>().cloned().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "FarmActor extracted outside auth_middleware"
            ))
        })?;
        let farm = parts.extensions.get::<FarmContext>().cloned().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "FarmActor extracted outside farm_context_middleware"
            ))
        })?;

        Ok(FarmActor { user, farm })
    }
}
