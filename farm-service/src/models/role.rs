//! Role model - farm-scoped named bundles of permissions.

use chrono::{DateTime, Utc};
use farm_core::permissions::Permission;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Role entity. Roles belong to exactly one farm; an "Owner" role in farm A
/// and one in farm B are distinct rows seeded independently at creation.
///
/// `version` is bumped on every grant/revoke so cached permission sets keyed
/// by `(user, farm, version)` go stale immediately on change.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Role {
    pub role_id: Uuid,
    pub farm_id: Uuid,
    pub name: String,
    pub version: i64,
    pub created_utc: DateTime<Utc>,
}

impl Role {
    pub fn new(farm_id: Uuid, name: String) -> Self {
        Self {
            role_id: Uuid::new_v4(),
            farm_id,
            name,
            version: 0,
            created_utc: Utc::now(),
        }
    }
}

/// A role definition to seed at farm creation.
#[derive(Debug, Clone)]
pub struct RoleSeed {
    pub name: &'static str,
    pub permissions: Vec<Permission>,
}

pub const OWNER_ROLE_NAME: &str = "Owner";

/// Default roles every new farm starts with. The creator is assigned Owner,
/// which holds every permission, so the at-least-one-owner invariant holds
/// from the first membership on.
pub fn default_farm_roles() -> Vec<RoleSeed> {
    vec![
        RoleSeed {
            name: OWNER_ROLE_NAME,
            permissions: Permission::ALL.to_vec(),
        },
        RoleSeed {
            name: "Manager",
            permissions: vec![
                Permission::FieldCreate,
                Permission::FieldRead,
                Permission::FieldUpdate,
                Permission::FieldDelete,
                Permission::TaskCreate,
                Permission::TaskRead,
                Permission::TaskUpdate,
                Permission::TaskDelete,
                Permission::EquipmentCreate,
                Permission::EquipmentRead,
                Permission::EquipmentUpdate,
                Permission::EquipmentDelete,
                Permission::CropHealthRead,
                Permission::WeatherRead,
                Permission::ReportRead,
                Permission::FarmMemberRead,
                Permission::FarmMemberInvite,
            ],
        },
        RoleSeed {
            name: "Worker",
            permissions: vec![
                Permission::FieldRead,
                Permission::TaskRead,
                Permission::TaskUpdate,
                Permission::EquipmentRead,
                Permission::CropHealthRead,
                Permission::WeatherRead,
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_seed_grants_everything() {
        let roles = default_farm_roles();
        let owner = roles.iter().find(|r| r.name == OWNER_ROLE_NAME).unwrap();
        assert_eq!(owner.permissions.len(), Permission::ALL.len());
    }

    #[test]
    fn non_owner_seeds_cannot_remove_members() {
        for seed in default_farm_roles() {
            if seed.name != OWNER_ROLE_NAME {
                assert!(!seed.permissions.contains(&Permission::FarmMemberRemove));
            }
        }
    }
}
