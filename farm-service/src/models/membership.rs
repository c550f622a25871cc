//! Farm membership - the user↔farm join carrying exactly one role.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One user's membership in one farm. A user has at most one membership per
/// farm (enforced by a unique index on `(farm_id, user_id)`).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FarmMembership {
    pub membership_id: Uuid,
    pub farm_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub joined_utc: DateTime<Utc>,
}

impl FarmMembership {
    pub fn new(farm_id: Uuid, user_id: Uuid, role_id: Uuid) -> Self {
        Self {
            membership_id: Uuid::new_v4(),
            farm_id,
            user_id,
            role_id,
            joined_utc: Utc::now(),
        }
    }
}
