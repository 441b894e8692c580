//! # Haver
//!
//! A multi-room chat server speaking a tab-delimited line protocol.
//!
//! Clients connect over TCP, announce themselves with `HAVER`, claim a
//! name, and then exchange private (`TO`) and room (`IN`) messages. Rooms
//! are opened, closed, and moderated by their owners.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use haver::prelude::*;
//!
//! # async fn start() -> Result<(), HaverError> {
//! let server = HaverServer::builder()
//!     .bind("0.0.0.0:7575")
//!     .hostname("chat.example.org")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::HaverError;
pub use server::{DEFAULT_BIND, HaverServer, HaverServerBuilder, LivenessConfig, ServerConfig};

pub use haver_directory as directory;
pub use haver_protocol as protocol;
pub use haver_session as session;
pub use haver_tick as tick;
pub use haver_transport as transport;

/// Convenient re-exports for common types.
pub mod prelude {
    pub use crate::{HaverError, HaverServer, HaverServerBuilder, LivenessConfig, ServerConfig};
    pub use haver_directory::{Directory, DirectoryError, Namespace, Room, User};
    pub use haver_protocol::{Fail, Line, ProtocolError};
    pub use haver_session::{Phase, Registry, SessionError};
}
