//! Unified error type for the Haver server.

use haver_directory::DirectoryError;
use haver_protocol::ProtocolError;
use haver_session::SessionError;
use haver_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HaverError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A framing error (escape, empty line).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A directory error (bad name, unknown entity).
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// A session error (failure or protocol violation).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Bad server configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
