//! `retailpos-core` — shared domain building blocks.
//!
//! Identifiers, the domain error model and the small traits every retail
//! record implements. No IO lives here.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId, UserId};
