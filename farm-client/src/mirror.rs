//! Client-side permission mirror.
//!
//! A read-through cache of the server-resolved permission set, refreshed on
//! login and on every farm switch, exposing a synchronous check for UI
//! gating. Never an enforcement boundary: the server re-checks every
//! mutating request.

use std::str::FromStr;
use std::sync::RwLock;

use farm_core::permissions::{Permission, PermissionSet};

/// Loading is explicit so UI code can tell "still fetching" apart from
/// "loaded with zero grants" and avoid a flash of open or closed controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionState {
    Loading,
    Loaded(PermissionSet),
}

pub struct PermissionMirror {
    state: RwLock<PermissionState>,
}

impl Default for PermissionMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionMirror {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(PermissionState::Loading),
        }
    }

    /// Synchronous gate for UI affordances. Answers `false` while loading:
    /// controls stay hidden until the real set arrives.
    pub fn has_permission(&self, permission: Permission) -> bool {
        match &*self.state.read().expect("mirror lock poisoned") {
            PermissionState::Loading => false,
            PermissionState::Loaded(set) => set.contains(permission),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(
            &*self.state.read().expect("mirror lock poisoned"),
            PermissionState::Loaded(_)
        )
    }

    pub fn state(&self) -> PermissionState {
        self.state.read().expect("mirror lock poisoned").clone()
    }

    /// Drop back to `Loading`. Called at the start of a farm switch so a
    /// stale set from the previous farm is never consulted mid-switch.
    pub fn invalidate(&self) {
        *self.state.write().expect("mirror lock poisoned") = PermissionState::Loading;
    }

    /// Install a freshly fetched set, as wire strings from the permission
    /// endpoint. Strings that are not in the catalog are skipped; the
    /// mirror only ever narrows, never invents grants.
    pub fn install(&self, permissions: &[String]) {
        let set: PermissionSet = permissions
            .iter()
            .filter_map(|s| match Permission::from_str(s) {
                Ok(p) => Some(p),
                Err(_) => {
                    tracing::warn!(permission = %s, "Unknown permission string from server");
                    None
                }
            })
            .collect();
        *self.state.write().expect("mirror lock poisoned") = PermissionState::Loaded(set);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_answers_no_to_everything() {
        let mirror = PermissionMirror::new();
        assert!(!mirror.is_loaded());
        for p in Permission::ALL {
            assert!(!mirror.has_permission(p));
        }
    }

    #[test]
    fn loaded_set_is_exact() {
        let mirror = PermissionMirror::new();
        mirror.install(&["FIELD_READ".to_string(), "TASK_READ".to_string()]);

        assert!(mirror.is_loaded());
        assert!(mirror.has_permission(Permission::FieldRead));
        assert!(mirror.has_permission(Permission::TaskRead));
        assert!(!mirror.has_permission(Permission::FieldCreate));
        assert!(!mirror.has_permission(Permission::FarmMemberRemove));
    }

    #[test]
    fn loaded_empty_differs_from_loading() {
        let mirror = PermissionMirror::new();
        mirror.install(&[]);

        // Zero grants, but the answer is now definitive.
        assert!(mirror.is_loaded());
        assert_eq!(mirror.state(), PermissionState::Loaded(PermissionSet::default()));
        assert!(!mirror.has_permission(Permission::FieldRead));
    }

    #[test]
    fn invalidate_returns_to_loading() {
        let mirror = PermissionMirror::new();
        mirror.install(&["FIELD_READ".to_string()]);
        assert!(mirror.has_permission(Permission::FieldRead));

        mirror.invalidate();
        assert!(!mirror.is_loaded());
        assert!(!mirror.has_permission(Permission::FieldRead));
    }

    #[test]
    fn unknown_strings_are_dropped_not_granted() {
        let mirror = PermissionMirror::new();
        mirror.install(&["FIELD_READ".to_string(), "SUPER_ADMIN".to_string()]);

        let PermissionState::Loaded(set) = mirror.state() else {
            panic!("expected loaded state");
        };
        assert_eq!(set.len(), 1);
        assert!(set.contains(Permission::FieldRead));
    }
}
