//! Wire protocol for Haver.
//!
//! This crate defines the "language" that clients and servers speak:
//!
//! - **Codec** ([`escape`], [`unescape`], [`parse`], [`deparse`]): how a
//!   command and its arguments become one tab-delimited line and back.
//! - **Types** ([`Line`]): a decoded command line, used for both
//!   directions.
//! - **Failures** ([`Fail`]): the recoverable, structured error that a
//!   client sees as a `FAIL` line.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!   These are never reported as `FAIL`; the session treats them as fatal.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw lines) and session
//! (phases, handlers). It doesn't know about users or rooms; it only
//! knows how to frame and unframe fields.
//!
//! ```text
//! Transport (text lines) → Protocol (Line) → Session (dispatch)
//! ```

mod codec;
mod error;
mod fail;
mod types;

pub use codec::{deparse, escape, is_command_token, parse, unescape};
pub use error::ProtocolError;
pub use fail::Fail;
pub use types::Line;
