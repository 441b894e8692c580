//! Per-connection task: read lines, write queued output, tick liveness.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The task owns the socket. Everything else
//! (handlers on this or other connections) reaches it through the
//! session's outbox channel. The loop waits on three things at once:
//!
//!   1. Outbound items → write the line, or flush and stop on `Close`
//!   2. Inbound lines  → dispatch to the session under the directory lock
//!   3. Timer ticks    → liveness check under the directory lock

use std::sync::Arc;

use haver_directory::Outbound;
use haver_session::Session;
use haver_tick::TickScheduler;
use haver_transport::{Connection, TcpConnection, TransportError};
use tokio::sync::mpsc;

use crate::HaverError;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
///
/// Whatever ends the loop, the session is torn down afterwards so a
/// vanished client never leaves a registered user behind.
pub(crate) async fn handle_connection(
    conn: TcpConnection,
    state: Arc<ServerState>,
) -> Result<(), HaverError> {
    let conn_id = conn.id();
    let peer = conn.peer_addr();
    tracing::debug!(%conn_id, %peer, "handling new connection");

    let (outbox, mut outbound) = mpsc::unbounded_channel();
    let mut session = Session::new(conn_id, peer, conn.is_secure(), outbox);

    let result = serve(&conn, &state, &mut session, &mut outbound).await;

    state.locked(|ctx| session.disconnect(ctx)).await;
    if let Err(e) = conn.close().await {
        tracing::trace!(%conn_id, error = %e, "close failed");
    }
    tracing::debug!(%conn_id, phase = %session.phase(), "connection finished");
    result
}

async fn serve(
    conn: &TcpConnection,
    state: &ServerState,
    session: &mut Session,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
) -> Result<(), HaverError> {
    let conn_id = conn.id();
    let mut ticks = TickScheduler::new(state.ticks.clone());

    loop {
        tokio::select! {
            // Drain queued output first so a `Close` is only seen after
            // every line queued before it has been written.
            biased;

            item = outbound.recv() => match item {
                Some(Outbound::Line(line)) => {
                    conn.send(&line.to_wire()).await?;
                }
                Some(Outbound::Close) | None => {
                    tracing::debug!(%conn_id, "close requested");
                    return Ok(());
                }
            },

            received = conn.recv() => match received {
                Ok(Some(raw)) => {
                    tracing::trace!(%conn_id, line = %raw, "recv");
                    state.locked(|ctx| session.handle_line(&raw, ctx)).await;
                }
                Ok(None) => {
                    tracing::info!(%conn_id, "connection closed by peer");
                    return Ok(());
                }
                Err(TransportError::LineTooLong(max)) => {
                    let message = format!("line exceeds {max} bytes");
                    state.locked(|ctx| session.bork(&message, ctx)).await;
                }
                Err(TransportError::Malformed) => {
                    state.locked(|ctx| session.bork("malformed line", ctx)).await;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    return Err(e.into());
                }
            },

            info = ticks.wait_for_tick() => {
                tracing::trace!(%conn_id, tick = info.tick, "liveness check");
                state.locked(|ctx| session.check_liveness(ctx)).await;
            }
        }
    }
}
