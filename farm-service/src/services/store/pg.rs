//! PostgreSQL-backed store using sqlx.

use async_trait::async_trait;
use farm_core::error::AppError;
use farm_core::permissions::Permission;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{Farm, FarmMembership, Role, RoleSeed, User};

use super::{FarmStore, FarmSummary, MemberRecord};

/// PostgreSQL store wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_permissions(raw: Vec<String>) -> Result<Vec<Permission>, AppError> {
    raw.into_iter()
        .map(|s| {
            s.parse::<Permission>()
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
        })
        .collect()
}

#[async_trait]
impl FarmStore for PgStore {
    async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (user_id, email, display_name, password_hash, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(user.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Email is already registered"
            )));
        }
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn create_farm(
        &self,
        farm: &Farm,
        seeds: &[RoleSeed],
        owner_user_id: Uuid,
    ) -> Result<FarmMembership, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        sqlx::query(
            r#"
            INSERT INTO farms (farm_id, name, created_by_user_id, created_utc)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(farm.farm_id)
        .bind(&farm.name)
        .bind(farm.created_by_user_id)
        .bind(farm.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let mut owner_role_id = None;
        for seed in seeds {
            let role = Role::new(farm.farm_id, seed.name.to_string());
            sqlx::query(
                r#"
                INSERT INTO roles (role_id, farm_id, name, version, created_utc)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(role.role_id)
            .bind(role.farm_id)
            .bind(&role.name)
            .bind(role.version)
            .bind(role.created_utc)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

            for permission in &seed.permissions {
                sqlx::query(
                    "INSERT INTO role_permissions (role_id, permission) VALUES ($1, $2)",
                )
                .bind(role.role_id)
                .bind(permission.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
            }

            if seed.name == crate::models::OWNER_ROLE_NAME {
                owner_role_id = Some(role.role_id);
            }
        }

        let owner_role_id = owner_role_id.ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Farm seed roles missing an Owner role"))
        })?;

        let membership = FarmMembership::new(farm.farm_id, owner_user_id, owner_role_id);
        sqlx::query(
            r#"
            INSERT INTO farm_memberships (membership_id, farm_id, user_id, role_id, joined_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(membership.membership_id)
        .bind(membership.farm_id)
        .bind(membership.user_id)
        .bind(membership.role_id)
        .bind(membership.joined_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok(membership)
    }

    async fn find_farm_by_id(&self, farm_id: Uuid) -> Result<Option<Farm>, AppError> {
        sqlx::query_as::<_, Farm>("SELECT * FROM farms WHERE farm_id = $1")
            .bind(farm_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn find_membership(
        &self,
        user_id: Uuid,
        farm_id: Uuid,
    ) -> Result<Option<FarmMembership>, AppError> {
        sqlx::query_as::<_, FarmMembership>(
            "SELECT * FROM farm_memberships WHERE user_id = $1 AND farm_id = $2",
        )
        .bind(user_id)
        .bind(farm_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn find_memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<FarmMembership>, AppError> {
        sqlx::query_as::<_, FarmMembership>(
            "SELECT * FROM farm_memberships WHERE user_id = $1 ORDER BY joined_utc, farm_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn list_farms_for_user(&self, user_id: Uuid) -> Result<Vec<FarmSummary>, AppError> {
        sqlx::query_as::<_, FarmSummary>(
            r#"
            SELECT f.farm_id, f.name AS farm_name, m.role_id, r.name AS role_name, m.joined_utc
            FROM farm_memberships m
            JOIN farms f ON f.farm_id = m.farm_id
            JOIN roles r ON r.role_id = m.role_id
            WHERE m.user_id = $1
            ORDER BY m.joined_utc, f.farm_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn list_farm_members(&self, farm_id: Uuid) -> Result<Vec<MemberRecord>, AppError> {
        sqlx::query_as::<_, MemberRecord>(
            r#"
            SELECT m.user_id, u.email, u.display_name, m.role_id, r.name AS role_name, m.joined_utc
            FROM farm_memberships m
            JOIN users u ON u.user_id = m.user_id
            JOIN roles r ON r.role_id = m.role_id
            WHERE m.farm_id = $1
            ORDER BY m.joined_utc
            "#,
        )
        .bind(farm_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn insert_membership_if_absent(
        &self,
        membership: &FarmMembership,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO farm_memberships (membership_id, farm_id, user_id, role_id, joined_utc)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (farm_id, user_id) DO NOTHING
            "#,
        )
        .bind(membership.membership_id)
        .bind(membership.farm_id)
        .bind(membership.user_id)
        .bind(membership.role_id)
        .bind(membership.joined_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_member_guarded(
        &self,
        farm_id: Uuid,
        user_id: Uuid,
        guard: Permission,
    ) -> Result<bool, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        // Lock the farm's membership rows so concurrent removals serialize;
        // otherwise two removals of the last two guard-holders could both
        // observe a holder count of two.
        sqlx::query("SELECT membership_id FROM farm_memberships WHERE farm_id = $1 FOR UPDATE")
            .bind(farm_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let target = sqlx::query_as::<_, FarmMembership>(
            "SELECT * FROM farm_memberships WHERE farm_id = $1 AND user_id = $2",
        )
        .bind(farm_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let Some(target) = target else {
            return Ok(false);
        };

        let target_holds_guard: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM role_permissions WHERE role_id = $1 AND permission = $2)",
        )
        .bind(target.role_id)
        .bind(guard.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        if target_holds_guard {
            let holders: i64 = sqlx::query_scalar(
                r#"
                SELECT COUNT(*)
                FROM farm_memberships m
                JOIN role_permissions rp ON rp.role_id = m.role_id
                WHERE m.farm_id = $1 AND rp.permission = $2
                "#,
            )
            .bind(farm_id)
            .bind(guard.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

            if holders <= 1 {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Cannot remove the last member able to manage this farm's membership"
                )));
            }
        }

        sqlx::query("DELETE FROM farm_memberships WHERE farm_id = $1 AND user_id = $2")
            .bind(farm_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok(true)
    }

    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, AppError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn find_roles_for_farm(&self, farm_id: Uuid) -> Result<Vec<Role>, AppError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE farm_id = $1 ORDER BY created_utc")
            .bind(farm_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn insert_role(&self, role: &Role, permissions: &[Permission]) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        sqlx::query(
            r#"
            INSERT INTO roles (role_id, farm_id, name, version, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(role.role_id)
        .bind(role.farm_id)
        .bind(&role.name)
        .bind(role.version)
        .bind(role.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            // A racing create can slip past the handler's duplicate check
            // and land on the UNIQUE (farm_id, name) index.
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                AppError::Conflict(anyhow::anyhow!(
                    "A role named '{}' already exists in this farm",
                    role.name
                ))
            } else {
                AppError::DatabaseError(anyhow::anyhow!(e))
            }
        })?;

        for permission in permissions {
            sqlx::query("INSERT INTO role_permissions (role_id, permission) VALUES ($1, $2)")
                .bind(role.role_id)
                .bind(permission.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn get_role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>, AppError> {
        let raw: Vec<String> =
            sqlx::query_scalar("SELECT permission FROM role_permissions WHERE role_id = $1")
                .bind(role_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        parse_permissions(raw)
    }

    async fn grant_permission(
        &self,
        role_id: Uuid,
        permission: Permission,
    ) -> Result<Role, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let role = sqlx::query_as::<_, Role>(
            "UPDATE roles SET version = version + 1 WHERE role_id = $1 RETURNING *",
        )
        .bind(role_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok(role)
    }

    async fn revoke_permission(
        &self,
        role_id: Uuid,
        permission: Permission,
    ) -> Result<Role, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission = $2")
            .bind(role_id)
            .bind(permission.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let role = sqlx::query_as::<_, Role>(
            "UPDATE roles SET version = version + 1 WHERE role_id = $1 RETURNING *",
        )
        .bind(role_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok(role)
    }
}
