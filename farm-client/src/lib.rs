//! Client SDK for farmdeck.
//!
//! Three layers: [`api::FarmApiClient`] speaks the HTTP surface,
//! [`session::Session`] holds the bearer token and selected farm, and
//! [`mirror::PermissionMirror`] caches the resolved permission set for
//! synchronous UI gating. The mirror is a UX convenience only; the server
//! re-checks every operation regardless of what the mirror says.

pub mod api;
pub mod error;
pub mod mirror;
pub mod session;

pub use api::FarmApiClient;
pub use error::ClientError;
pub use mirror::{PermissionMirror, PermissionState};
pub use session::Session;
