//! Entity directory for Haver.
//!
//! Holds every user and room on the server, enforces case-insensitive name
//! uniqueness, and implements room membership with its fan-out.
//!
//! # Key types
//!
//! - [`Directory`]: the name tables, plus join/part/quit/close
//! - [`User`]: a registered user, attached or detached
//! - [`Room`]: a named room with an owner and a member set
//! - [`Attribute`]: literal or computed attribute values
//! - [`Outbound`] / [`Link`]: how handlers reach a live connection

mod directory;
mod entity;
mod error;
mod outbox;
mod room;
mod user;

pub use directory::Directory;
pub use entity::{
    Attribute, Attributes, Entity, Namespace, fold, is_reserved,
    validate_claimable, validate_name,
};
pub use error::DirectoryError;
pub use outbox::{Link, Outbound, Outbox};
pub use room::Room;
pub use user::{SPOOL_LIMIT, Spooled, User};
