//! The user entity.

use std::collections::{BTreeMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use haver_protocol::Line;
use haver_transport::ConnectionId;
use tokio::time::Instant;

use crate::entity::{self, Attribute, Attributes, Entity, Namespace};
use crate::{Directory, DirectoryError, Link};

/// Most messages kept for a detached user. Older ones are dropped first.
pub const SPOOL_LIMIT: usize = 1024;

/// A message buffered for a detached user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spooled {
    /// When the message would have been delivered.
    pub at: DateTime<Utc>,
    /// The message itself.
    pub line: Line,
}

/// Tracks time since the user last sent a message.
///
/// Shared with the computed `idle` attribute, so the attribute can be
/// evaluated without a reference to the user.
#[derive(Debug, Clone)]
struct IdleClock {
    origin: Instant,
    last_active_ms: Arc<AtomicU64>,
}

impl IdleClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_active_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    fn touch(&self) {
        let ms = self.origin.elapsed().as_millis() as u64;
        self.last_active_ms.store(ms, Ordering::Relaxed);
    }

    fn idle(&self) -> Duration {
        let now = self.origin.elapsed().as_millis() as u64;
        let last = self.last_active_ms.load(Ordering::Relaxed);
        Duration::from_millis(now.saturating_sub(last))
    }
}

/// A registered chat user.
///
/// While `link` is `Some`, messages go straight to the user's connection.
/// While it is `None` the user is *detached*: messages are appended to the
/// spool and replayed on reattach.
#[derive(Debug)]
pub struct User {
    name: String,
    attributes: Attributes,
    idle: IdleClock,
    /// Joined rooms: folded name → display name.
    rooms: BTreeMap<String, String>,
    link: Option<Link>,
    spool: VecDeque<Spooled>,
    detach_key: Option<String>,
    address: IpAddr,
    secure: bool,
}

impl User {
    /// Creates a user attached to `link`.
    ///
    /// # Errors
    /// [`DirectoryError::InvalidName`] or [`DirectoryError::ReservedName`]
    /// if the name can't be claimed.
    pub fn new(
        name: &str,
        address: IpAddr,
        secure: bool,
        version: &str,
        link: Link,
    ) -> Result<Self, DirectoryError> {
        entity::validate_claimable(name)?;

        let idle = IdleClock::new();
        let clock = idle.clone();
        let mut attributes = Attributes::default();
        attributes.set(
            "idle",
            Attribute::computed(move || clock.idle().as_secs().to_string()),
        );
        attributes.set("address", address.to_string());
        attributes.set("version", version);
        attributes.set("secure", if secure { "yes" } else { "no" });

        Ok(Self {
            name: name.to_string(),
            attributes,
            idle,
            rooms: BTreeMap::new(),
            link: Some(link),
            spool: VecDeque::new(),
            detach_key: None,
            address,
            secure,
        })
    }

    /// Resets the idle timer.
    pub fn update_idle(&self) {
        self.idle.touch();
    }

    /// Time since the last message this user sent.
    pub fn idle(&self) -> Duration {
        self.idle.idle()
    }

    /// Address of the connection the user registered or last attached from.
    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// Whether the user's current connection is encrypted.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Records where a new connection for this user comes from.
    pub(crate) fn relocate(&mut self, address: IpAddr, secure: bool) {
        self.address = address;
        self.secure = secure;
        self.attributes.set("address", address.to_string());
        self.attributes.set("secure", if secure { "yes" } else { "no" });
    }

    /// Display names of the rooms this user is in.
    pub fn rooms(&self) -> impl Iterator<Item = &str> {
        self.rooms.values().map(String::as_str)
    }

    pub(crate) fn add_room(&mut self, room: &str) {
        self.rooms.insert(entity::fold(room), room.to_string());
    }

    pub(crate) fn remove_room(&mut self, room: &str) {
        self.rooms.remove(&entity::fold(room));
    }

    /// The live connection, if attached.
    pub fn link(&self) -> Option<&Link> {
        self.link.as_ref()
    }

    /// Whether a live connection is attached.
    pub fn is_attached(&self) -> bool {
        self.link.is_some()
    }

    /// Whether `id` is the connection this user is attached to.
    pub fn is_linked_to(&self, id: ConnectionId) -> bool {
        self.link.as_ref().is_some_and(|l| l.id == id)
    }

    /// Delivers a message: sent live if attached, spooled if detached.
    ///
    /// A send into a connection that has already gone away is dropped. A
    /// full spool loses its oldest entry.
    pub fn deliver(&mut self, line: Line) {
        match &self.link {
            Some(link) => {
                if !link.send(line) {
                    tracing::trace!(user = %self.name, "dropped message to closed connection");
                }
            }
            None => {
                if self.spool.len() >= SPOOL_LIMIT {
                    self.spool.pop_front();
                    tracing::debug!(user = %self.name, "spool full, dropped oldest");
                }
                self.spool.push_back(Spooled {
                    at: Utc::now(),
                    line,
                });
            }
        }
    }

    /// Detaches from the live connection, remembering `key` for reattach.
    ///
    /// Returns the old link so the caller can close it.
    pub fn detach(&mut self, key: &str) -> Option<Link> {
        self.detach_key = Some(key.to_string());
        self.link.take()
    }

    /// Whether `key` matches the secret given at detach.
    pub fn detach_key_matches(&self, key: &str) -> bool {
        self.detach_key.as_deref() == Some(key)
    }

    /// Reattaches to a new connection. Clears the key and hands back the
    /// spooled messages, oldest first.
    pub fn attach(&mut self, link: Link) -> Vec<Spooled> {
        self.link = Some(link);
        self.detach_key = None;
        self.spool.drain(..).collect()
    }

    /// Number of buffered messages.
    pub fn spooled(&self) -> usize {
        self.spool.len()
    }
}

impl Entity for User {
    const NAMESPACE: Namespace = Namespace::User;

    fn name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn table(dir: &Directory) -> &std::collections::HashMap<String, Self> {
        &dir.users
    }

    fn table_mut(
        dir: &mut Directory,
    ) -> &mut std::collections::HashMap<String, Self> {
        &mut dir.users
    }
}
