pub mod email;
pub mod jwt;
pub mod permissions;
pub mod store;

pub use email::{EmailProvider, MockEmailService, SmtpEmail};
pub use jwt::{AccessTokenClaims, InvitationClaims, JwtService, TokenResponse};
pub use permissions::PermissionResolver;
pub use store::{FarmStore, FarmSummary, MemberRecord, MemoryStore, PgStore};
