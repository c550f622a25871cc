//! Farm model - the tenant boundary everything else belongs to.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Farm entity. Fields, tasks and equipment (out of scope here) each belong
/// to exactly one farm; authorization is always evaluated inside one farm.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Farm {
    pub farm_id: Uuid,
    pub name: String,
    pub created_by_user_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl Farm {
    pub fn new(name: String, created_by_user_id: Uuid) -> Self {
        Self {
            farm_id: Uuid::new_v4(),
            name,
            created_by_user_id,
            created_utc: Utc::now(),
        }
    }
}
