//! Domain layer: caller identities and their invariants.

pub mod builder;
pub mod error;
pub mod identity;

pub use builder::{IdentityInput, build, build_from_value};
pub use error::DomainError;
pub use identity::{ANONYMOUS_USER_ID, BackendIdentity, Identity, IdentityAttributes, UserId};
