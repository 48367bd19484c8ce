//! Persistent entities (admins, targets, associations) and the identifiers they share.

pub mod admin;
pub mod association;
pub mod id;
pub mod secret;
pub mod target;

pub use admin::*;
pub use association::*;
pub use id::*;
pub use secret::*;
pub use target::*;
