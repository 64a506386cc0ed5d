//! `retailpos-auth` — roles, permissions and the caller context.
//!
//! Decoupled from HTTP and storage: the infra layer persists role/permission
//! assignments, this crate decides what they should be.

pub mod assignment;
pub mod permissions;
pub mod roles;
pub mod session;

pub use assignment::PermissionDiff;
pub use permissions::{Permission, PermissionId};
pub use roles::{Role, RoleId};
pub use session::SessionContext;
