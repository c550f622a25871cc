//! Permission Set Resolver.
//!
//! Resolves the concrete permission set for a validated (user, farm) pair.
//! Results may be cached, but only keyed by (user, farm, role version):
//! grants and revokes bump the role version in the same write, so a stale
//! set is never served past the mutation that invalidated it.

use std::sync::Arc;

use dashmap::DashMap;
use farm_core::error::AppError;
use farm_core::permissions::PermissionSet;
use uuid::Uuid;

use super::store::FarmStore;
use crate::models::FarmMembership;

#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn FarmStore>,
    cache: Arc<DashMap<(Uuid, Uuid, i64), Arc<PermissionSet>>>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn FarmStore>) -> Self {
        Self {
            store,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Resolve the permission set for an already-verified membership.
    ///
    /// An empty set is a normal result for a role with no grants.
    pub async fn resolve(
        &self,
        membership: &FarmMembership,
    ) -> Result<Arc<PermissionSet>, AppError> {
        let role = self
            .store
            .find_role_by_id(membership.role_id)
            .await?
            .ok_or_else(|| {
                AppError::DatabaseError(anyhow::anyhow!("Membership references a missing role"))
            })?;

        let key = (membership.user_id, membership.farm_id, role.version);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let permissions = self.store.get_role_permissions(role.role_id).await?;
        let set: Arc<PermissionSet> = Arc::new(permissions.into_iter().collect());

        // Entries for superseded role versions of this (user, farm) are dead.
        self.cache.retain(|(user, farm, version), _| {
            !(*user == key.0 && *farm == key.1 && *version < key.2)
        });
        self.cache.insert(key, set.clone());

        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, User};
    use crate::services::store::MemoryStore;
    use farm_core::permissions::Permission;

    async fn setup() -> (PermissionResolver, Arc<MemoryStore>, FarmMembership, Role) {
        let store = Arc::new(MemoryStore::new());
        let user = User::new("res@example.com", None, "h".into());
        store.insert_user(&user).await.unwrap();

        let farm_id = Uuid::new_v4();
        let role = Role::new(farm_id, "Viewer".into());
        store
            .insert_role(&role, &[Permission::FieldRead, Permission::TaskRead])
            .await
            .unwrap();

        let membership = FarmMembership::new(farm_id, user.user_id, role.role_id);
        store.insert_membership_if_absent(&membership).await.unwrap();

        let resolver = PermissionResolver::new(store.clone() as Arc<dyn FarmStore>);
        (resolver, store, membership, role)
    }

    #[tokio::test]
    async fn resolves_exactly_the_granted_set() {
        let (resolver, _store, membership, _role) = setup().await;
        let set = resolver.resolve(&membership).await.unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(Permission::FieldRead));
        assert!(set.contains(Permission::TaskRead));
        assert!(!set.contains(Permission::FieldCreate));
    }

    #[tokio::test]
    async fn revocation_invalidates_the_cache() {
        let (resolver, store, membership, role) = setup().await;

        let before = resolver.resolve(&membership).await.unwrap();
        assert!(before.contains(Permission::TaskRead));

        store
            .revoke_permission(role.role_id, Permission::TaskRead)
            .await
            .unwrap();

        let after = resolver.resolve(&membership).await.unwrap();
        assert!(!after.contains(Permission::TaskRead));
        assert!(after.contains(Permission::FieldRead));
    }

    #[tokio::test]
    async fn empty_grant_set_is_not_an_error() {
        let store = Arc::new(MemoryStore::new());
        let farm_id = Uuid::new_v4();
        let role = Role::new(farm_id, "Bystander".into());
        store.insert_role(&role, &[]).await.unwrap();
        let membership = FarmMembership::new(farm_id, Uuid::new_v4(), role.role_id);
        store.insert_membership_if_absent(&membership).await.unwrap();

        let resolver = PermissionResolver::new(store as Arc<dyn FarmStore>);
        let set = resolver.resolve(&membership).await.unwrap();
        assert!(set.is_empty());
    }
}
