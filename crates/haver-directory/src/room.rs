//! The room entity.

use std::collections::BTreeMap;

use crate::entity::{self, Attributes, Entity, Namespace};
use crate::{Directory, DirectoryError};

/// A named chat room.
///
/// Members are held as name keys, not references: the [`Directory`] owns
/// every user, and membership is resolved through it when a message fans
/// out.
#[derive(Debug)]
pub struct Room {
    name: String,
    attributes: Attributes,
    owner: String,
    secure: bool,
    /// Members: folded name → display name.
    members: BTreeMap<String, String>,
}

impl Room {
    /// Creates an empty, insecure room.
    ///
    /// # Errors
    /// [`DirectoryError::InvalidName`] or [`DirectoryError::ReservedName`]
    /// if the name can't be claimed.
    pub fn new(name: &str, owner: &str) -> Result<Self, DirectoryError> {
        entity::validate_claimable(name)?;
        let mut attributes = Attributes::default();
        attributes.set("owner", owner);
        attributes.set("secure", "no");
        Ok(Self {
            name: name.to_string(),
            attributes,
            owner: owner.to_string(),
            secure: false,
            members: BTreeMap::new(),
        })
    }

    /// Name of the user who opened the room.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Case-insensitive ownership check.
    pub fn is_owner(&self, user: &str) -> bool {
        entity::fold(&self.owner) == entity::fold(user)
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Marks the room secure. Only secure connections may join afterwards.
    pub fn set_secure(&mut self) {
        self.secure = true;
        self.attributes.set("secure", "yes");
    }

    pub fn is_member(&self, user: &str) -> bool {
        self.members.contains_key(&entity::fold(user))
    }

    /// Display names of the members.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.values().map(String::as_str)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn member_keys(&self) -> impl Iterator<Item = &String> {
        self.members.keys()
    }

    pub(crate) fn add_member(&mut self, user: &str) {
        self.members.insert(entity::fold(user), user.to_string());
    }

    pub(crate) fn remove_member(&mut self, user: &str) {
        self.members.remove(&entity::fold(user));
    }
}

impl Entity for Room {
    const NAMESPACE: Namespace = Namespace::Room;

    fn name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn table(dir: &Directory) -> &std::collections::HashMap<String, Self> {
        &dir.rooms
    }

    fn table_mut(
        dir: &mut Directory,
    ) -> &mut std::collections::HashMap<String, Self> {
        &mut dir.rooms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_room_defaults() {
        let room = Room::new("lobby", "alice").unwrap();
        assert_eq!(room.name(), "lobby");
        assert_eq!(room.attribute("owner").unwrap(), "alice");
        assert_eq!(room.attribute("secure").unwrap(), "no");
        assert!(room.is_owner("ALICE"));
        assert!(!room.is_owner("bob"));
        assert_eq!(room.member_count(), 0);
    }

    #[test]
    fn test_set_secure_updates_attribute() {
        let mut room = Room::new("vault", "alice").unwrap();
        room.set_secure();
        assert!(room.is_secure());
        assert_eq!(room.attribute("secure").unwrap(), "yes");
    }

    #[test]
    fn test_reserved_room_name_rejected() {
        assert_eq!(
            Room::new("&lobby", "alice").unwrap_err(),
            DirectoryError::ReservedName("&lobby".into())
        );
    }

    #[test]
    fn test_membership_is_case_insensitive() {
        let mut room = Room::new("lobby", "alice").unwrap();
        room.add_member("Bob");
        assert!(room.is_member("bob"));
        assert_eq!(room.members().collect::<Vec<_>>(), vec!["Bob"]);
        room.remove_member("BOB");
        assert!(!room.is_member("Bob"));
    }
}
