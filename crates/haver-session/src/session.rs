//! One connection's protocol state and the dispatch loop that drives it.
//!
//! A [`Session`] never touches a socket. The connection task feeds it raw
//! lines and timer ticks; it answers by pushing [`Outbound`] items into the
//! connection's outbox and by mutating the shared [`Directory`].

use std::net::SocketAddr;

use haver_directory::{Directory, Link, Outbound, Outbox, User};
use haver_protocol::{Fail, Line, is_command_token};
use haver_transport::ConnectionId;
use rand::Rng;
use tokio::time::Instant;

use crate::config::SessionConfig;
use crate::phase::Phase;
use crate::registry::Registry;
use crate::SessionError;

/// Everything a command needs besides the session itself.
///
/// Built fresh for every line while the directory lock is held.
pub struct Context<'a> {
    pub directory: &'a mut Directory,
    pub registry: &'a Registry,
    pub config: &'a SessionConfig,
}

impl<'a> Context<'a> {
    pub fn new(
        directory: &'a mut Directory,
        registry: &'a Registry,
        config: &'a SessionConfig,
    ) -> Self {
        Self {
            directory,
            registry,
            config,
        }
    }
}

/// Protocol state of a single connection.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    peer: SocketAddr,
    secure: bool,
    phase: Phase,
    last_command: Instant,
    outstanding_ping: Option<String>,
    client_version: Option<String>,
    client_supports: Vec<String>,
    user: Option<String>,
    outbox: Outbox,
}

impl Session {
    pub fn new(id: ConnectionId, peer: SocketAddr, secure: bool, outbox: Outbox) -> Self {
        Self {
            id,
            peer,
            secure,
            phase: Phase::Connect,
            last_command: Instant::now(),
            outstanding_ping: None,
            client_version: None,
            client_supports: Vec::new(),
            user: None,
            outbox,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the connection should be torn down.
    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    /// The registered user name, once past login.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Client version from the handshake.
    pub fn client_version(&self) -> Option<&str> {
        self.client_version.as_deref()
    }

    /// Extensions the client said it supports.
    pub fn client_supports(&self) -> &[String] {
        &self.client_supports
    }

    pub fn has_outstanding_ping(&self) -> bool {
        self.outstanding_ping.is_some()
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    /// Queues a line for this connection.
    pub fn reply(&self, line: Line) {
        if self.outbox.send(Outbound::Line(line)).is_err() {
            tracing::trace!(conn = %self.id, "reply to closed connection dropped");
        }
    }

    fn close(&self) {
        let _ = self.outbox.send(Outbound::Close);
    }

    /// A link for attaching a user to this connection.
    pub(crate) fn link(&self) -> Link {
        Link::new(self.id, self.outbox.clone())
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Handles one raw inbound line.
    ///
    /// Failures are reported to the client as `FAIL`; protocol violations
    /// end the session with `BORK`. Before the handshake completes, either
    /// one closes the connection without a word.
    pub fn handle_line(&mut self, raw: &str, ctx: &mut Context<'_>) {
        if self.is_finished() {
            return;
        }
        self.last_command = Instant::now();

        if self.is_superseded(ctx.directory) {
            tracing::debug!(conn = %self.id, user = ?self.user, "input on superseded session");
            self.phase = Phase::Quit;
            self.close();
            return;
        }

        let line = match Line::decode(raw) {
            Ok(line) => line,
            Err(e) => return self.fatal(SessionError::from(e), ctx),
        };

        match self.dispatch(&line, ctx) {
            Ok(()) => {}
            Err(SessionError::Fail(fail)) if self.phase == Phase::Connect => {
                tracing::debug!(conn = %self.id, %fail, "handshake failed");
                self.phase = Phase::Quit;
                self.close();
            }
            Err(SessionError::Fail(fail)) => {
                tracing::debug!(conn = %self.id, command = %line.command, %fail, "command failed");
                self.reply(
                    Line::new("FAIL")
                        .arg(&line.command)
                        .arg(&fail.kind)
                        .args(fail.args),
                );
            }
            Err(err) => self.fatal(err, ctx),
        }
    }

    fn dispatch(&mut self, line: &Line, ctx: &mut Context<'_>) -> Result<(), SessionError> {
        if !is_command_token(&line.command) {
            return Err(SessionError::bork(format!(
                "malformed command {:?}",
                line.command
            )));
        }

        let registry = ctx.registry;
        let spec = registry
            .get(&line.command)
            .ok_or_else(|| Fail::new("unknown.command").arg(&line.command))?;

        if spec.phase != self.phase {
            return Err(Fail::new("strange.command")
                .arg(spec.phase.as_str())
                .arg(self.phase.as_str())
                .into());
        }

        if !spec.arity.accepts(line.args.len()) {
            return Err(Fail::new("arity")
                .arg(spec.arity.to_string())
                .arg(line.args.len().to_string())
                .into());
        }

        tracing::trace!(conn = %self.id, command = spec.name, "dispatch");
        if let Some(next) = (spec.handler)(self, ctx, &line.args)? {
            tracing::debug!(conn = %self.id, from = %self.phase, to = %next, "phase change");
            self.phase = next;
        }
        Ok(())
    }

    /// Whether this session's user has been taken over by another
    /// connection (ghosted) while this one was still open.
    fn is_superseded(&self, directory: &Directory) -> bool {
        if self.phase != Phase::Normal {
            return false;
        }
        let Some(name) = &self.user else {
            return false;
        };
        !directory
            .lookup::<User>(name)
            .is_ok_and(|u| u.is_linked_to(self.id))
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Ends the session for a protocol violation.
    ///
    /// Quits the user with reason `bork`, sends `BORK` (unless still in the
    /// handshake), and closes the connection.
    pub fn bork(&mut self, message: &str, ctx: &mut Context<'_>) {
        if self.is_finished() {
            return;
        }
        tracing::warn!(conn = %self.id, peer = %self.peer, message, "protocol violation");
        self.quit_user(ctx.directory, "bork", None);
        if self.phase != Phase::Connect {
            self.reply(Line::new("BORK").arg(message));
        }
        self.close();
        self.phase = Phase::Bork;
    }

    fn fatal(&mut self, err: SessionError, ctx: &mut Context<'_>) {
        let message = match err {
            SessionError::Bork(message) => message,
            SessionError::Fail(fail) => fail.to_string(),
        };
        self.bork(&message, ctx);
    }

    /// The transport went away underneath the session.
    ///
    /// Quits the user with reason `closed` unless the session already
    /// ended, detached, or was ghosted.
    pub fn disconnect(&mut self, ctx: &mut Context<'_>) {
        if self.is_finished() {
            return;
        }
        self.quit_user(ctx.directory, "closed", None);
        self.phase = Phase::Quit;
    }

    /// Parts the session's user from every room and unregisters it.
    ///
    /// Only acts if the user is still attached to this connection.
    pub(crate) fn quit_user(&self, directory: &mut Directory, reason: &str, detail: Option<&str>) {
        if self.phase != Phase::Normal {
            return;
        }
        let Some(name) = self.user.clone() else {
            return;
        };
        let linked = directory
            .lookup::<User>(&name)
            .is_ok_and(|u| u.is_linked_to(self.id));
        if !linked {
            return;
        }
        if let Err(e) = directory.quit(&name, reason, detail) {
            tracing::warn!(conn = %self.id, user = %name, error = %e, "quit failed");
        }
    }

    // -----------------------------------------------------------------------
    // Liveness
    // -----------------------------------------------------------------------

    /// Runs one liveness check. Called on every timer tick.
    ///
    /// A session whose previous `PING` went unanswered is disconnected with
    /// `BYE ping`. Otherwise, one that has been silent longer than the
    /// configured timeout is sent a `PING` with a fresh token.
    pub fn check_liveness(&mut self, ctx: &mut Context<'_>) {
        if self.phase != Phase::Normal {
            return;
        }

        if self.outstanding_ping.is_some() {
            tracing::info!(conn = %self.id, user = ?self.user, "ping timeout");
            self.quit_user(ctx.directory, "ping", None);
            self.reply(Line::new("BYE").arg("ping"));
            self.close();
            self.phase = Phase::Quit;
            return;
        }

        if self.last_command.elapsed() > ctx.config.ping_timeout {
            let token = ping_token();
            tracing::debug!(conn = %self.id, %token, "ping");
            self.reply(Line::new("PING").arg(&token));
            self.outstanding_ping = Some(token);
        }
    }

    // -----------------------------------------------------------------------
    // State used by handlers
    // -----------------------------------------------------------------------

    pub(crate) fn record_handshake(&mut self, version: &str, supports: Vec<String>) {
        self.client_version = Some(version.to_string());
        self.client_supports = supports;
    }

    pub(crate) fn set_user(&mut self, name: &str) {
        self.user = Some(name.to_string());
    }

    /// The logged-in user's name. Only called from normal-phase handlers.
    pub(crate) fn me(&self) -> Result<&str, SessionError> {
        self.user
            .as_deref()
            .ok_or_else(|| SessionError::bork("no user on an authenticated session"))
    }

    pub(crate) fn take_ping(&mut self) -> Option<String> {
        self.outstanding_ping.take()
    }

    pub(crate) fn close_transport(&self) {
        self.close();
    }
}

/// A random 64-bit hex nonce.
fn ping_token() -> String {
    format!("{:016x}", rand::rng().random::<u64>())
}
