//! Permission catalog shared by the backend and the client mirror.
//!
//! Permissions are global, immutable reference data named `<RESOURCE>_<ACTION>`.
//! A permission string only has meaning inside a farm membership's scope;
//! there is no wildcard and no global superuser.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of actions the system knows about.
///
/// Serialized as the canonical `<RESOURCE>_<ACTION>` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    FieldCreate,
    FieldRead,
    FieldUpdate,
    FieldDelete,
    TaskCreate,
    TaskRead,
    TaskUpdate,
    TaskDelete,
    EquipmentCreate,
    EquipmentRead,
    EquipmentUpdate,
    EquipmentDelete,
    CropHealthRead,
    WeatherRead,
    ReportRead,
    FarmUpdate,
    FarmMemberRead,
    FarmMemberInvite,
    FarmMemberRemove,
    FarmRoleManage,
}

impl Permission {
    pub const ALL: [Permission; 20] = [
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
        Permission::FarmUpdate,
        Permission::FarmMemberRead,
        Permission::FarmMemberInvite,
        Permission::FarmMemberRemove,
        Permission::FarmRoleManage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::FieldCreate => "FIELD_CREATE",
            Permission::FieldRead => "FIELD_READ",
            Permission::FieldUpdate => "FIELD_UPDATE",
            Permission::FieldDelete => "FIELD_DELETE",
            Permission::TaskCreate => "TASK_CREATE",
            Permission::TaskRead => "TASK_READ",
            Permission::TaskUpdate => "TASK_UPDATE",
            Permission::TaskDelete => "TASK_DELETE",
            Permission::EquipmentCreate => "EQUIPMENT_CREATE",
            Permission::EquipmentRead => "EQUIPMENT_READ",
            Permission::EquipmentUpdate => "EQUIPMENT_UPDATE",
            Permission::EquipmentDelete => "EQUIPMENT_DELETE",
            Permission::CropHealthRead => "CROP_HEALTH_READ",
            Permission::WeatherRead => "WEATHER_READ",
            Permission::ReportRead => "REPORT_READ",
            Permission::FarmUpdate => "FARM_UPDATE",
            Permission::FarmMemberRead => "FARM_MEMBER_READ",
            Permission::FarmMemberInvite => "FARM_MEMBER_INVITE",
            Permission::FarmMemberRemove => "FARM_MEMBER_REMOVE",
            Permission::FarmRoleManage => "FARM_ROLE_MANAGE",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission '{0}'")]
pub struct UnknownPermission(pub String);

/// An immutable, resolved set of permissions for one (user, farm) pair.
///
/// An empty set is a normal state for a role with no grants, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(HashSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self(HashSet::new())
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    /// Canonical string form, sorted for stable responses.
    pub fn to_sorted_strings(&self) -> Vec<String> {
        let mut v: Vec<String> = self.0.iter().map(|p| p.as_str().to_string()).collect();
        v.sort();
        v
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Permission> for PermissionSet {
    fn extend<T: IntoIterator<Item = Permission>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}
