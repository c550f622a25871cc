//! Persistence seam for the RBAC core.
//!
//! Handlers and middleware talk to `Arc<dyn FarmStore>`; production wires in
//! [`PgStore`], tests and local development use [`MemoryStore`].

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use farm_core::error::AppError;
use farm_core::permissions::Permission;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{Farm, FarmMembership, Role, RoleSeed, User};

/// One member of a farm, joined with their account and role for display.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MemberRecord {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role_id: Uuid,
    pub role_name: String,
    pub joined_utc: DateTime<Utc>,
}

/// One farm a user belongs to, joined with their role there.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FarmSummary {
    pub farm_id: Uuid,
    pub farm_name: String,
    pub role_id: Uuid,
    pub role_name: String,
    pub joined_utc: DateTime<Utc>,
}

#[async_trait]
pub trait FarmStore: Send + Sync {
    // ==================== Users ====================

    /// Insert a new user. Fails with `Conflict` if the email is taken.
    async fn insert_user(&self, user: &User) -> Result<(), AppError>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    /// Lookup by email; callers pass lowercased input.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    // ==================== Farms ====================

    /// Create a farm atomically: the farm row, its seeded roles, and the
    /// creator's Owner membership all commit together.
    async fn create_farm(
        &self,
        farm: &Farm,
        seeds: &[RoleSeed],
        owner_user_id: Uuid,
    ) -> Result<FarmMembership, AppError>;

    async fn find_farm_by_id(&self, farm_id: Uuid) -> Result<Option<Farm>, AppError>;

    // ==================== Memberships ====================

    async fn find_membership(
        &self,
        user_id: Uuid,
        farm_id: Uuid,
    ) -> Result<Option<FarmMembership>, AppError>;

    async fn find_memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<FarmMembership>, AppError>;

    async fn list_farms_for_user(&self, user_id: Uuid) -> Result<Vec<FarmSummary>, AppError>;

    async fn list_farm_members(&self, farm_id: Uuid) -> Result<Vec<MemberRecord>, AppError>;

    /// Insert a membership unless one already exists for (farm, user).
    /// Returns whether a row was inserted; an existing row is not an error
    /// (invitation acceptance is idempotent on top of this).
    async fn insert_membership_if_absent(
        &self,
        membership: &FarmMembership,
    ) -> Result<bool, AppError>;

    /// Remove a membership, unless the member's role grants `guard` and the
    /// removal would leave the farm with no member holding it. The check and
    /// the delete are atomic: two racing removals of the last two holders
    /// cannot both succeed. Returns whether the membership existed; a blocked
    /// removal is `Conflict`.
    async fn remove_member_guarded(
        &self,
        farm_id: Uuid,
        user_id: Uuid,
        guard: Permission,
    ) -> Result<bool, AppError>;

    // ==================== Roles ====================

    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, AppError>;

    async fn find_roles_for_farm(&self, farm_id: Uuid) -> Result<Vec<Role>, AppError>;

    async fn insert_role(&self, role: &Role, permissions: &[Permission]) -> Result<(), AppError>;

    async fn get_role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>, AppError>;

    /// Grant a permission to a role. Read-modify-write is atomic and bumps
    /// the role version so cached permission sets are invalidated.
    async fn grant_permission(&self, role_id: Uuid, permission: Permission)
        -> Result<Role, AppError>;

    /// Revoke a permission from a role, bumping the role version.
    async fn revoke_permission(
        &self,
        role_id: Uuid,
        permission: Permission,
    ) -> Result<Role, AppError>;
}
