/// Failures below the line protocol.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Writing to a peer whose socket is already gone.
    #[error("peer went away: {0}")]
    ConnectionClosed(String),

    #[error("write error: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("read error: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// The peer sent more than the configured maximum without a newline.
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),

    /// The peer sent a line that isn't valid UTF-8.
    #[error("line is not valid UTF-8")]
    Malformed,

    /// Binding the listener or accepting a peer failed.
    #[error("listener error: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// `accept` was called after `shutdown`.
    #[error("listener shut down")]
    Shutdown,
}
