pub mod auth;
pub mod farm;

pub use auth::{auth_middleware, AuthUser};
pub use farm::{farm_context_middleware, FarmActor, FarmContext, SELECTED_FARM_HEADER};
