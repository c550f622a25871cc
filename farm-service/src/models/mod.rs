//! Data models for farmdeck's RBAC core.

pub mod farm;
pub mod membership;
pub mod role;
pub mod user;

pub use farm::Farm;
pub use membership::FarmMembership;
pub use role::{default_farm_roles, Role, RoleSeed, OWNER_ROLE_NAME};
pub use user::{SanitizedUser, User};
