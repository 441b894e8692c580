//! Transport abstraction layer for Haver.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! how lines reach the server. The protocol is line oriented: one command
//! per line, and the session layer never sees partial input.
//!
//! [`TcpTransport`] is the plain TCP implementation. An encrypting
//! transport only needs to report `true` from [`Connection::is_secure`];
//! nothing above this crate looks at the bytes.

#![allow(async_fn_in_trait)]

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{DEFAULT_MAX_LINE_LENGTH, TcpConnection, TcpTransport};

use std::fmt;
use std::net::SocketAddr;

/// Process-unique identifier for one accepted connection.
///
/// Users remember the id of the connection they are attached to, so a
/// stale connection can tell it no longer owns its user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Source of peer connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Resolves with the next peer that connected.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Stops handing out new connections. Later `accept` calls fail.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// One peer, exchanging whole lines.
///
/// All methods take `&self` so the connection task can wait on `recv`
/// while a `send` is issued from another `select!` branch.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes `line` followed by CRLF.
    async fn send(&self, line: &str) -> Result<(), Self::Error>;

    /// Next line with its terminator removed, or `Ok(None)` at end of
    /// stream.
    async fn recv(&self) -> Result<Option<String>, Self::Error>;

    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;

    /// Whether the byte stream beneath the protocol is encrypted.
    fn is_secure(&self) -> bool {
        false
    }
}
