//! Error types for the session layer.

use haver_directory::DirectoryError;
use haver_protocol::{Fail, ProtocolError};

/// What a command handler can raise.
///
/// There are exactly two outcomes: a recoverable [`Fail`] that the client
/// sees as a `FAIL` line while the connection stays up, and a protocol
/// violation (`Bork`) that ends the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Recoverable failure, reported as `FAIL <cmd> <kind> <args...>`.
    #[error("failure: {0}")]
    Fail(#[from] Fail),

    /// Protocol violation, reported as `BORK <message>` before disconnect.
    #[error("protocol violation: {0}")]
    Bork(String),
}

impl SessionError {
    /// Shorthand for a `Bork` with the given message.
    pub fn bork(message: impl Into<String>) -> Self {
        Self::Bork(message.into())
    }
}

impl From<DirectoryError> for SessionError {
    fn from(err: DirectoryError) -> Self {
        Self::Fail(err.into())
    }
}

impl From<ProtocolError> for SessionError {
    fn from(err: ProtocolError) -> Self {
        Self::Bork(err.to_string())
    }
}
