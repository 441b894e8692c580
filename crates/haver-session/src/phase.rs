//! The per-connection phase machine.
//!
//! ```text
//!   Connect ──HAVER──→ Login ──IDENT/GHOST/SPOON:ATTACH──→ Normal ──BYE──→ Quit
//!                                                             │
//!                                                             ├──SPOON:DETACH──→ Spoon
//!                                                             └──(violation)───→ Bork
//! ```
//!
//! `Quit`, `Spoon`, and `Bork` are terminal for the connection. Only
//! `Spoon` leaves the user registered.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Fresh connection, waiting for `HAVER`.
    Connect,
    /// Handshake done, waiting for a name.
    Login,
    /// Authenticated.
    Normal,
    /// The user detached; the entity survives without this connection.
    Spoon,
    /// The user left or the connection ended.
    Quit,
    /// Protocol violation; the connection is being torn down.
    Bork,
}

impl Phase {
    /// Lower-case wire name, as used in `strange.command` failures.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Login => "login",
            Self::Normal => "normal",
            Self::Spoon => "spoon",
            Self::Quit => "quit",
            Self::Bork => "bork",
        }
    }

    /// Whether the connection is finished in this phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Spoon | Self::Quit | Self::Bork)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
