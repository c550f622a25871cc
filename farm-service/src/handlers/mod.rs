pub mod auth;
pub mod farm;
pub mod health;
pub mod invitation;
pub mod permission;
pub mod role;
pub mod user;
