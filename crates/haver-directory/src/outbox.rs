//! The channel from the directory to a live connection's writer task.
//!
//! Handlers never write to sockets themselves. They push [`Outbound`]
//! items into a peer's unbounded channel and move on; the connection task
//! on the other end owns the socket. A send into a closed channel is
//! dropped on the floor.

use haver_protocol::Line;
use haver_transport::ConnectionId;
use tokio::sync::mpsc;

/// Something a connection task should do on behalf of a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write this line.
    Line(Line),
    /// Flush what is queued, then close the transport.
    Close,
}

/// Channel sender for delivering outbound items to a connection.
pub type Outbox = mpsc::UnboundedSender<Outbound>;

/// A user's attachment to one live connection.
#[derive(Debug, Clone)]
pub struct Link {
    /// Which connection this is.
    pub id: ConnectionId,
    outbox: Outbox,
}

impl Link {
    pub fn new(id: ConnectionId, outbox: Outbox) -> Self {
        Self { id, outbox }
    }

    /// Queues a line. Returns `false` if the connection task is gone.
    pub fn send(&self, line: Line) -> bool {
        self.outbox.send(Outbound::Line(line)).is_ok()
    }

    /// Asks the connection task to close the transport.
    pub fn close(&self) {
        let _ = self.outbox.send(Outbound::Close);
    }
}
