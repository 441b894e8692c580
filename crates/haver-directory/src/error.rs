//! Error types for the directory layer.

use haver_protocol::Fail;

use crate::Namespace;

/// Errors that can occur during directory and membership operations.
///
/// Every variant is recoverable: it converts into a [`Fail`] whose kind is
/// the dotted name clients see in a `FAIL` line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// The name does not match the naming rule.
    #[error("invalid name {0:?}")]
    InvalidName(String),

    /// The name is valid but reserved for the server itself.
    #[error("name {0:?} is reserved")]
    ReservedName(String),

    /// Another live entity in the namespace already has this name.
    #[error("{0} {1:?} already exists")]
    ExistingEntity(Namespace, String),

    /// No entity with this name is registered in the namespace.
    #[error("no {0} named {1:?}")]
    UnknownEntity(Namespace, String),

    /// The namespace tag is not one the directory knows.
    #[error("unknown namespace {0:?}")]
    UnknownNamespace(String),

    /// The entity has never had this attribute set.
    #[error("{0} {1:?} has no attribute {2:?}")]
    UnknownAttribute(Namespace, String, String),

    /// The user is already a member of the room.
    #[error("{1} is already in {0}")]
    StrangeJoin(String, String),

    /// The user is not a member of the room.
    #[error("{1} is not in {0}")]
    StrangePart(String, String),
}

impl From<DirectoryError> for Fail {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::InvalidName(name) => {
                Fail::new("invalid.name").arg(name)
            }
            DirectoryError::ReservedName(name) => {
                Fail::new("reserved.name").arg(name)
            }
            DirectoryError::ExistingEntity(_, name) => {
                Fail::new("existing.entity").arg(name)
            }
            DirectoryError::UnknownEntity(ns, name) => {
                Fail::new("unknown.entity").arg(ns.as_str()).arg(name)
            }
            DirectoryError::UnknownNamespace(ns) => {
                Fail::new("unknown.namespace").arg(ns)
            }
            DirectoryError::UnknownAttribute(ns, name, key) => {
                Fail::new("unknown.attribute")
                    .args([ns.as_str().to_string(), name, key])
            }
            DirectoryError::StrangeJoin(room, _) => {
                Fail::new("strange.join").arg(room)
            }
            DirectoryError::StrangePart(room, _) => {
                Fail::new("strange.part").arg(room)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_entity_carries_display_name() {
        let fail: Fail =
            DirectoryError::ExistingEntity(Namespace::User, "Alice".into())
                .into();
        assert_eq!(fail.kind, "existing.entity");
        assert_eq!(fail.args, vec!["Alice"]);
    }

    #[test]
    fn test_unknown_entity_carries_namespace() {
        let fail: Fail =
            DirectoryError::UnknownEntity(Namespace::Room, "lobby".into())
                .into();
        assert_eq!(fail.to_string(), "unknown.entity room lobby");
    }
}
