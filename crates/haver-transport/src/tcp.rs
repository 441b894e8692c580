//! Line-framed TCP transport using `tokio-util`'s `LinesCodec`.
//!
//! Outgoing lines are written as `<line>\r\n`. Incoming lines are split on
//! `\n` and a single trailing `\r`, if present, is removed.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Longest inbound line accepted when none is configured.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 16 * 1024;

type LineStream = Framed<TcpStream, LinesCodec>;

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    max_line_length: usize,
    closed: AtomicBool,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self {
            listener,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            closed: AtomicBool::new(false),
        })
    }

    /// Sets the longest line a peer may send.
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %addr, "accepted TCP connection");

        let framed = Framed::new(
            stream,
            LinesCodec::new_with_max_length(self.max_line_length),
        );
        let (sink, stream) = framed.split();

        Ok(TcpConnection {
            id,
            addr,
            max_line_length: self.max_line_length,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }

    /// Stops accepting. Connections already handed out are unaffected.
    async fn shutdown(&self) -> Result<(), Self::Error> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!("TCP transport shut down");
        }
        Ok(())
    }
}

/// A single line-framed TCP connection.
///
/// Reader and writer halves are locked separately so a task blocked in
/// [`recv`](Connection::recv) never holds up [`send`](Connection::send).
pub struct TcpConnection {
    id: ConnectionId,
    addr: SocketAddr,
    max_line_length: usize,
    sink: Mutex<SplitSink<LineStream, String>>,
    stream: Mutex<SplitStream<LineStream>>,
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, line: &str) -> Result<(), Self::Error> {
        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\r');
        self.sink
            .lock()
            .await
            .send(framed)
            .await
            .map_err(|e| match e {
                LinesCodecError::Io(io) => TransportError::SendFailed(io),
                LinesCodecError::MaxLineLengthExceeded => {
                    TransportError::LineTooLong(self.max_line_length)
                }
            })
    }

    async fn recv(&self) -> Result<Option<String>, Self::Error> {
        match self.stream.lock().await.next().await {
            Some(Ok(mut line)) => {
                if line.ends_with('\r') {
                    line.pop();
                }
                Ok(Some(line))
            }
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                Err(TransportError::LineTooLong(self.max_line_length))
            }
            Some(Err(LinesCodecError::Io(e))) if e.kind() == io::ErrorKind::InvalidData => {
                Err(TransportError::Malformed)
            }
            Some(Err(LinesCodecError::Io(e))) => {
                Err(TransportError::ReceiveFailed(e))
            }
            None => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| match e {
                LinesCodecError::Io(io) => TransportError::SendFailed(io),
                LinesCodecError::MaxLineLengthExceeded => {
                    TransportError::ConnectionClosed("close failed".into())
                }
            })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}
