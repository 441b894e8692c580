//! The directory: one case-insensitive name table per namespace.
//!
//! # Concurrency note
//!
//! `Directory` is NOT thread-safe by itself; it uses plain `HashMap`s.
//! The server wraps it in a single mutex and holds that lock for the whole
//! of one command, which makes every check-then-act sequence here (and in
//! the handlers above) atomic with respect to other connections.

use std::collections::HashMap;
use std::net::IpAddr;

use haver_protocol::Line;

use crate::entity::{self, Entity, Namespace};
use crate::{DirectoryError, Link, Room, Spooled, User};

/// Registry of every live user and room.
#[derive(Debug, Default)]
pub struct Directory {
    pub(crate) users: HashMap<String, User>,
    pub(crate) rooms: HashMap<String, Room>,
}

impl Directory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Registers an entity under its folded name.
    ///
    /// # Errors
    /// [`DirectoryError::ExistingEntity`] if the name is taken in that
    /// namespace, regardless of case.
    pub fn add<E: Entity>(&mut self, entity: E) -> Result<&mut E, DirectoryError> {
        let key = entity::fold(entity.name());
        let table = E::table_mut(self);
        if table.contains_key(&key) {
            return Err(DirectoryError::ExistingEntity(
                E::NAMESPACE,
                entity.name().to_string(),
            ));
        }
        tracing::debug!(ns = %E::NAMESPACE, name = entity.name(), "entity registered");
        Ok(table.entry(key).or_insert(entity))
    }

    /// Finds an entity by name.
    ///
    /// # Errors
    /// [`DirectoryError::InvalidName`] if the name is malformed,
    /// [`DirectoryError::UnknownEntity`] if nothing is registered under it.
    pub fn lookup<E: Entity>(&self, name: &str) -> Result<&E, DirectoryError> {
        entity::validate_name(name)?;
        E::table(self)
            .get(&entity::fold(name))
            .ok_or_else(|| DirectoryError::UnknownEntity(E::NAMESPACE, name.to_string()))
    }

    /// Mutable form of [`lookup`](Self::lookup).
    pub fn lookup_mut<E: Entity>(&mut self, name: &str) -> Result<&mut E, DirectoryError> {
        entity::validate_name(name)?;
        E::table_mut(self)
            .get_mut(&entity::fold(name))
            .ok_or_else(|| DirectoryError::UnknownEntity(E::NAMESPACE, name.to_string()))
    }

    /// Unregisters an entity and hands it back.
    ///
    /// This does not touch membership; use [`quit`](Self::quit) or
    /// [`close_room`](Self::close_room) to take an entity out cleanly.
    ///
    /// # Errors
    /// [`DirectoryError::UnknownEntity`] if the name isn't registered.
    pub fn remove<E: Entity>(&mut self, name: &str) -> Result<E, DirectoryError> {
        let removed = E::table_mut(self)
            .remove(&entity::fold(name))
            .ok_or_else(|| DirectoryError::UnknownEntity(E::NAMESPACE, name.to_string()))?;
        tracing::debug!(ns = %E::NAMESPACE, name, "entity removed");
        Ok(removed)
    }

    /// Whether a name is taken in `E`'s namespace.
    pub fn contains<E: Entity>(&self, name: &str) -> bool {
        E::table(self).contains_key(&entity::fold(name))
    }

    /// Every entity of one kind, in no particular order.
    pub fn members<'a, E: Entity + 'a>(&'a self) -> impl Iterator<Item = &'a E> {
        E::table(self).values()
    }

    /// Display names in a namespace, sorted.
    pub fn names(&self, ns: Namespace) -> Vec<String> {
        let mut names: Vec<String> = match ns {
            Namespace::User => self.users.values().map(|u| u.name().to_string()).collect(),
            Namespace::Room => self.rooms.values().map(|r| r.name().to_string()).collect(),
        };
        names.sort_by_key(|n| entity::fold(n));
        names
    }

    /// Resolved attributes of one entity, looked up by namespace tag.
    pub fn attributes(
        &self,
        ns: Namespace,
        name: &str,
    ) -> Result<Vec<(String, String)>, DirectoryError> {
        Ok(match ns {
            Namespace::User => self.lookup::<User>(name)?.attributes().resolved(),
            Namespace::Room => self.lookup::<Room>(name)?.attributes().resolved(),
        })
    }

    /// Returns `root` if it is free, otherwise `root` followed by the
    /// smallest positive integer that makes it free.
    pub fn generate_name(&self, ns: Namespace, root: &str) -> String {
        let taken = |name: &str| match ns {
            Namespace::User => self.contains::<User>(name),
            Namespace::Room => self.contains::<Room>(name),
        };
        if !taken(root) {
            return root.to_string();
        }
        (1u64..)
            .map(|n| format!("{root}{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| root.to_string())
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    /// Delivers a line to one user (live or spooled).
    pub fn send_to(&mut self, user: &str, line: Line) -> Result<(), DirectoryError> {
        self.lookup_mut::<User>(user)?.deliver(line);
        Ok(())
    }

    /// Delivers a line to every current member of a room.
    ///
    /// A member that can't receive doesn't stop delivery to the rest.
    pub fn broadcast(&mut self, room: &str, line: &Line) -> Result<(), DirectoryError> {
        entity::validate_name(room)?;
        let room = self
            .rooms
            .get(&entity::fold(room))
            .ok_or_else(|| DirectoryError::UnknownEntity(Namespace::Room, room.to_string()))?;
        for key in room.member_keys() {
            if let Some(user) = self.users.get_mut(key) {
                user.deliver(line.clone());
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Adds a user to a room and announces `JOIN room user` to every
    /// member, the joiner included.
    ///
    /// # Errors
    /// [`DirectoryError::UnknownEntity`] if either side is missing,
    /// [`DirectoryError::StrangeJoin`] if the user is already a member.
    /// Nothing is changed on error.
    pub fn join(&mut self, room: &str, user: &str) -> Result<(), DirectoryError> {
        let (room_name, user_name) = {
            let r = self.lookup::<Room>(room)?;
            let u = self.lookup::<User>(user)?;
            if r.is_member(u.name()) {
                return Err(DirectoryError::StrangeJoin(
                    r.name().to_string(),
                    u.name().to_string(),
                ));
            }
            (r.name().to_string(), u.name().to_string())
        };

        self.lookup_mut::<Room>(&room_name)?.add_member(&user_name);
        self.lookup_mut::<User>(&user_name)?.add_room(&room_name);
        tracing::info!(room = %room_name, user = %user_name, "joined");

        // Membership is committed; the announcement is best effort.
        let event = Line::new("JOIN").arg(&room_name).arg(&user_name);
        let _ = self.broadcast(&room_name, &event);
        Ok(())
    }

    /// Removes a user from a room after announcing
    /// `PART room user reason [detail]` to every member, the leaver
    /// included.
    ///
    /// # Errors
    /// [`DirectoryError::UnknownEntity`] if either side is missing,
    /// [`DirectoryError::StrangePart`] if the user isn't a member.
    pub fn part(
        &mut self,
        room: &str,
        user: &str,
        reason: &str,
        detail: Option<&str>,
    ) -> Result<(), DirectoryError> {
        let (room_name, user_name) = {
            let r = self.lookup::<Room>(room)?;
            let u = self.lookup::<User>(user)?;
            if !r.is_member(u.name()) {
                return Err(DirectoryError::StrangePart(
                    r.name().to_string(),
                    u.name().to_string(),
                ));
            }
            (r.name().to_string(), u.name().to_string())
        };

        let mut event = Line::new("PART").arg(&room_name).arg(&user_name).arg(reason);
        if let Some(detail) = detail {
            event = event.arg(detail);
        }
        self.broadcast(&room_name, &event)?;

        self.lookup_mut::<Room>(&room_name)?.remove_member(&user_name);
        self.lookup_mut::<User>(&user_name)?.remove_room(&room_name);
        tracing::info!(room = %room_name, user = %user_name, reason, "parted");
        Ok(())
    }

    /// Parts a user from every room with `reason` and unregisters them.
    pub fn quit(
        &mut self,
        user: &str,
        reason: &str,
        detail: Option<&str>,
    ) -> Result<User, DirectoryError> {
        let rooms: Vec<String> = self
            .lookup::<User>(user)?
            .rooms()
            .map(str::to_string)
            .collect();
        for room in rooms {
            if let Err(e) = self.part(&room, user, reason, detail) {
                tracing::warn!(%user, %room, error = %e, "part during quit failed");
            }
        }
        let removed = self.remove::<User>(user)?;
        tracing::info!(user = removed.name(), reason, "user quit");
        Ok(removed)
    }

    /// Parts every member with `close <closer>` and unregisters the room.
    ///
    /// The closer, if a member, leaves last so they see every departure.
    pub fn close_room(&mut self, room: &str, closer: &str) -> Result<Room, DirectoryError> {
        let closer_key = entity::fold(closer);
        let mut members: Vec<String> = self
            .lookup::<Room>(room)?
            .members()
            .map(str::to_string)
            .collect();
        members.sort_by_key(|m| entity::fold(m) == closer_key);
        for member in members {
            self.part(room, &member, "close", Some(closer))?;
        }
        let removed = self.remove::<Room>(room)?;
        tracing::info!(room = removed.name(), %closer, "room closed");
        Ok(removed)
    }

    /// Moves a detached user onto a new connection and returns their
    /// spool, oldest first.
    ///
    /// The user's address and security flag follow the new connection.
    ///
    /// # Errors
    /// [`DirectoryError::UnknownEntity`] if the user doesn't exist.
    pub fn reattach(
        &mut self,
        user: &str,
        link: Link,
        address: IpAddr,
        secure: bool,
    ) -> Result<Vec<Spooled>, DirectoryError> {
        let user = self.lookup_mut::<User>(user)?;
        user.relocate(address, secure);
        let spooled = user.attach(link);
        Ok(spooled)
    }

    /// Parts a user from every secure room they are in, with reason
    /// `secure`. Returns the rooms left.
    pub fn evict_from_secure_rooms(&mut self, user: &str) -> Result<Vec<String>, DirectoryError> {
        let secure_rooms: Vec<String> = self
            .lookup::<User>(user)?
            .rooms()
            .filter(|room| self.lookup::<Room>(room).is_ok_and(Room::is_secure))
            .map(str::to_string)
            .collect();
        for room in &secure_rooms {
            self.part(room, user, "secure", None)?;
        }
        Ok(secure_rooms)
    }

    /// Marks a room secure and parts every member whose connection isn't
    /// secure, with reason `secure`. Returns the evicted names.
    pub fn secure_room(&mut self, room: &str) -> Result<Vec<String>, DirectoryError> {
        let insecure: Vec<String> = {
            let r = self.lookup::<Room>(room)?;
            r.members()
                .filter(|m| {
                    self.lookup::<User>(m)
                        .map(|u| !u.is_secure())
                        .unwrap_or(false)
                })
                .map(str::to_string)
                .collect()
        };
        self.lookup_mut::<Room>(room)?.set_secure();
        for member in &insecure {
            self.part(room, member, "secure", None)?;
        }
        Ok(insecure)
    }
}
