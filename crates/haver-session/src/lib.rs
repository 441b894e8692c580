//! Session engine for Haver.
//!
//! Turns a stream of inbound lines into directory mutations and outbound
//! events:
//!
//! 1. **Phases**: where a connection is in its lifecycle ([`Phase`])
//! 2. **Registry**: which commands exist and when they apply ([`Registry`])
//! 3. **Dispatch**: validation, failure reporting, and teardown ([`Session`])
//! 4. **Liveness**: `PING` for quiet connections ([`Session::check_liveness`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)      ← owns sockets, feeds lines and ticks into sessions
//!     ↕
//! Session (this crate) ← phase machine and command handlers
//!     ↕
//! Directory (below)   ← users, rooms, membership, fan-out
//! ```

mod config;
mod error;
mod handlers;
mod phase;
mod registry;
mod session;

pub use config::SessionConfig;
pub use error::SessionError;
pub use phase::Phase;
pub use registry::{Arity, CommandSpec, Handler, Registry};
pub use session::{Context, Session};
