//! Error types for the protocol layer.
//!
//! Each crate in Haver defines its own error enum. A `ProtocolError` always
//! means the peer sent something that cannot be framed; the session layer
//! answers it with `BORK` and drops the connection.

/// Errors that can occur while decoding a line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The line had no content at all.
    #[error("empty line")]
    EmptyLine,

    /// An escape character was followed by a letter that has no meaning.
    #[error("unknown escape sequence ESC {0:?}")]
    UnknownEscape(char),

    /// The field ended right after an escape character.
    #[error("dangling escape at end of field")]
    DanglingEscape,

    /// The first field is not a well-formed command token.
    #[error("malformed command token {0:?}")]
    MalformedCommand(String),

    /// The line is longer than the server is willing to buffer.
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),
}
