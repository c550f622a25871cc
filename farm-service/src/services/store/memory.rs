//! In-memory store used by tests and local development.
//!
//! Mirrors the PostgreSQL semantics that matter to the RBAC core: unique
//! emails and role names, at most one membership per (farm, user), atomic
//! grant/revoke with a version bump, and serialized guarded removals.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use farm_core::error::AppError;
use farm_core::permissions::Permission;
use uuid::Uuid;

use crate::models::{Farm, FarmMembership, Role, RoleSeed, User};

use super::{FarmStore, FarmSummary, MemberRecord};

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    /// Unique-email index, standing in for the database constraint.
    users_by_email: DashMap<String, Uuid>,
    farms: DashMap<Uuid, Farm>,
    roles: DashMap<Uuid, (Role, HashSet<Permission>)>,
    /// Keyed by (farm_id, user_id).
    memberships: DashMap<(Uuid, Uuid), FarmMembership>,
    /// Serializes guarded removals, which span several maps.
    removal_gate: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn role_grants(&self, role_id: Uuid, permission: Permission) -> bool {
        self.roles
            .get(&role_id)
            .map(|entry| entry.1.contains(&permission))
            .unwrap_or(false)
    }
}

#[async_trait]
impl FarmStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        match self.users_by_email.entry(user.email.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AppError::Conflict(
                anyhow::anyhow!("Email is already registered"),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                self.users.insert(user.user_id, user.clone());
                slot.insert(user.user_id);
                Ok(())
            }
        }
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let Some(user_id) = self.users_by_email.get(email).map(|entry| *entry) else {
            return Ok(None);
        };
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn create_farm(
        &self,
        farm: &Farm,
        seeds: &[RoleSeed],
        owner_user_id: Uuid,
    ) -> Result<FarmMembership, AppError> {
        self.farms.insert(farm.farm_id, farm.clone());

        let mut owner_role_id = None;
        for seed in seeds {
            let role = Role::new(farm.farm_id, seed.name.to_string());
            if seed.name == crate::models::OWNER_ROLE_NAME {
                owner_role_id = Some(role.role_id);
            }
            self.roles.insert(
                role.role_id,
                (role, seed.permissions.iter().copied().collect()),
            );
        }

        let owner_role_id = owner_role_id.ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Farm seed roles missing an Owner role"))
        })?;

        let membership = FarmMembership::new(farm.farm_id, owner_user_id, owner_role_id);
        self.memberships
            .insert((farm.farm_id, owner_user_id), membership.clone());

        Ok(membership)
    }

    async fn find_farm_by_id(&self, farm_id: Uuid) -> Result<Option<Farm>, AppError> {
        Ok(self.farms.get(&farm_id).map(|f| f.clone()))
    }

    async fn find_membership(
        &self,
        user_id: Uuid,
        farm_id: Uuid,
    ) -> Result<Option<FarmMembership>, AppError> {
        Ok(self.memberships.get(&(farm_id, user_id)).map(|m| m.clone()))
    }

    async fn find_memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<FarmMembership>, AppError> {
        let mut memberships: Vec<FarmMembership> = self
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.clone())
            .collect();
        memberships.sort_by_key(|m| (m.joined_utc, m.farm_id));
        Ok(memberships)
    }

    async fn list_farms_for_user(&self, user_id: Uuid) -> Result<Vec<FarmSummary>, AppError> {
        let memberships = self.find_memberships_for_user(user_id).await?;
        let mut summaries = Vec::with_capacity(memberships.len());
        for m in memberships {
            let farm = self
                .farms
                .get(&m.farm_id)
                .map(|f| f.clone())
                .ok_or_else(|| AppError::DatabaseError(anyhow::anyhow!("Dangling farm id")))?;
            let role = self
                .roles
                .get(&m.role_id)
                .map(|r| r.0.clone())
                .ok_or_else(|| AppError::DatabaseError(anyhow::anyhow!("Dangling role id")))?;
            summaries.push(FarmSummary {
                farm_id: farm.farm_id,
                farm_name: farm.name,
                role_id: role.role_id,
                role_name: role.name,
                joined_utc: m.joined_utc,
            });
        }
        Ok(summaries)
    }

    async fn list_farm_members(&self, farm_id: Uuid) -> Result<Vec<MemberRecord>, AppError> {
        let mut memberships: Vec<FarmMembership> = self
            .memberships
            .iter()
            .filter(|m| m.farm_id == farm_id)
            .map(|m| m.clone())
            .collect();
        memberships.sort_by_key(|m| m.joined_utc);

        let mut records = Vec::with_capacity(memberships.len());
        for m in memberships {
            let user = self
                .users
                .get(&m.user_id)
                .map(|u| u.clone())
                .ok_or_else(|| AppError::DatabaseError(anyhow::anyhow!("Dangling user id")))?;
            let role = self
                .roles
                .get(&m.role_id)
                .map(|r| r.0.clone())
                .ok_or_else(|| AppError::DatabaseError(anyhow::anyhow!("Dangling role id")))?;
            records.push(MemberRecord {
                user_id: user.user_id,
                email: user.email,
                display_name: user.display_name,
                role_id: role.role_id,
                role_name: role.name,
                joined_utc: m.joined_utc,
            });
        }
        Ok(records)
    }

    async fn insert_membership_if_absent(
        &self,
        membership: &FarmMembership,
    ) -> Result<bool, AppError> {
        match self
            .memberships
            .entry((membership.farm_id, membership.user_id))
        {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(membership.clone());
                Ok(true)
            }
        }
    }

    async fn remove_member_guarded(
        &self,
        farm_id: Uuid,
        user_id: Uuid,
        guard: Permission,
    ) -> Result<bool, AppError> {
        // Holds until the delete lands, so a racing removal cannot observe
        // a stale guard-holder count.
        let _gate = self.removal_gate.lock().expect("removal gate poisoned");

        let Some(target) = self.memberships.get(&(farm_id, user_id)).map(|m| m.clone()) else {
            return Ok(false);
        };

        if self.role_grants(target.role_id, guard) {
            let holders = self
                .memberships
                .iter()
                .filter(|m| m.farm_id == farm_id && self.role_grants(m.role_id, guard))
                .count();
            if holders <= 1 {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Cannot remove the last member able to manage this farm's membership"
                )));
            }
        }

        Ok(self.memberships.remove(&(farm_id, user_id)).is_some())
    }

    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, AppError> {
        Ok(self.roles.get(&role_id).map(|r| r.0.clone()))
    }

    async fn find_roles_for_farm(&self, farm_id: Uuid) -> Result<Vec<Role>, AppError> {
        let mut roles: Vec<Role> = self
            .roles
            .iter()
            .filter(|r| r.0.farm_id == farm_id)
            .map(|r| r.0.clone())
            .collect();
        roles.sort_by_key(|r| r.created_utc);
        Ok(roles)
    }

    async fn insert_role(&self, role: &Role, permissions: &[Permission]) -> Result<(), AppError> {
        // Mirrors the UNIQUE (farm_id, name) index.
        if self
            .roles
            .iter()
            .any(|r| r.0.farm_id == role.farm_id && r.0.name == role.name)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "A role named '{}' already exists in this farm",
                role.name
            )));
        }
        self.roles.insert(
            role.role_id,
            (role.clone(), permissions.iter().copied().collect()),
        );
        Ok(())
    }

    async fn get_role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>, AppError> {
        Ok(self
            .roles
            .get(&role_id)
            .map(|r| r.1.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn grant_permission(
        &self,
        role_id: Uuid,
        permission: Permission,
    ) -> Result<Role, AppError> {
        let mut entry = self
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;
        entry.1.insert(permission);
        entry.0.version += 1;
        Ok(entry.0.clone())
    }

    async fn revoke_permission(
        &self,
        role_id: Uuid,
        permission: Permission,
    ) -> Result<Role, AppError> {
        let mut entry = self
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;
        entry.1.remove(&permission);
        entry.0.version += 1;
        Ok(entry.0.clone())
    }
}
