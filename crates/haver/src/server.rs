//! `HaverServer` builder and accept loop.
//!
//! Ties the layers together: transport → session → directory. One task per
//! connection; all of them share the directory behind a single lock.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use haver_directory::Directory;
use haver_session::{Context, Registry, SessionConfig};
use haver_tick::TickConfig;
use haver_transport::{DEFAULT_MAX_LINE_LENGTH, TcpTransport, Transport};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::HaverError;
use crate::handler::handle_connection;

/// Default listen address.
pub const DEFAULT_BIND: &str = "0.0.0.0:7575";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Liveness checking: how often to look, and how much silence is allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Time between checks. Zero turns liveness checking off.
    pub interval: Duration,
    /// Silence after which a connection is pinged.
    pub timeout: Duration,
    /// Random delay (0..max) added to a connection's first check.
    pub initial_jitter: Duration,
}

impl LivenessConfig {
    /// Checks every `interval`, pinging after one interval of silence.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            timeout: interval,
            ..Self::default()
        }
    }

    pub(crate) fn tick_config(&self) -> TickConfig {
        TickConfig {
            initial_jitter: self.initial_jitter,
            ..TickConfig::with_interval(self.interval)
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(60),
            initial_jitter: Duration::from_millis(500),
        }
    }
}

/// Everything needed to start a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
    /// Name announced in the `HAVER` reply.
    pub hostname: String,
    /// Version announced in the `HAVER` reply.
    pub version: String,
    pub liveness: LivenessConfig,
    /// Longest accepted line, in bytes. Longer lines are a protocol
    /// violation.
    pub max_line_length: usize,
}

impl ServerConfig {
    /// Defaults overridden by `HAVER_BIND`, `HAVER_HOSTNAME`, and
    /// `HAVER_PING_SECS`.
    pub fn from_env() -> Result<Self, HaverError> {
        let mut config = Self::default();
        if let Ok(bind) = std::env::var("HAVER_BIND") {
            config.bind = bind;
        }
        if let Ok(hostname) = std::env::var("HAVER_HOSTNAME") {
            config.hostname = hostname;
        }
        if let Ok(secs) = std::env::var("HAVER_PING_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                HaverError::Config(format!("HAVER_PING_SECS must be a number, got {secs:?}"))
            })?;
            config.liveness = LivenessConfig::every(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub(crate) fn session_config(&self) -> SessionConfig {
        SessionConfig {
            hostname: self.hostname.clone(),
            version: self.version.clone(),
            ping_timeout: self.liveness.timeout,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            hostname: "localhost".to_string(),
            version: format!("haver/{}", env!("CARGO_PKG_VERSION")),
            liveness: LivenessConfig::default(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared server state passed to each connection task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The directory
/// is the only mutable part.
pub(crate) struct ServerState {
    pub(crate) directory: Mutex<Directory>,
    pub(crate) registry: Registry,
    pub(crate) session: SessionConfig,
    pub(crate) ticks: TickConfig,
}

impl ServerState {
    /// Runs `f` with the directory locked.
    ///
    /// Every command and every liveness check goes through here, so each
    /// one sees and leaves the directory in a consistent state.
    pub(crate) async fn locked<R>(&self, f: impl FnOnce(&mut Context<'_>) -> R) -> R {
        let mut directory = self.directory.lock().await;
        let mut ctx = Context::new(&mut directory, &self.registry, &self.session);
        f(&mut ctx)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a Haver server.
///
/// # Example
///
/// ```rust,ignore
/// use haver::prelude::*;
///
/// let server = HaverServer::builder()
///     .bind("0.0.0.0:7575")
///     .hostname("chat.example.org")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct HaverServerBuilder {
    config: ServerConfig,
}

impl HaverServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    pub fn hostname(mut self, hostname: &str) -> Self {
        self.config.hostname = hostname.to_string();
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.config.version = version.to_string();
        self
    }

    pub fn liveness(mut self, liveness: LivenessConfig) -> Self {
        self.config.liveness = liveness;
        self
    }

    pub fn max_line_length(mut self, max: usize) -> Self {
        self.config.max_line_length = max;
        self
    }

    /// Binds the listener and sets up shared state.
    pub async fn build(self) -> Result<HaverServer, HaverError> {
        let transport = TcpTransport::bind(&self.config.bind)
            .await?
            .with_max_line_length(self.config.max_line_length);

        let state = Arc::new(ServerState {
            directory: Mutex::new(Directory::new()),
            registry: Registry::standard(),
            session: self.config.session_config(),
            ticks: self.config.liveness.tick_config(),
        });

        Ok(HaverServer {
            transport,
            state,
            config: self.config,
        })
    }
}

impl Default for HaverServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A bound Haver server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct HaverServer {
    transport: TcpTransport,
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl HaverServer {
    /// Creates a new builder.
    pub fn builder() -> HaverServerBuilder {
        HaverServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs the accept loop, spawning a task per connection. Runs until
    /// the process is terminated.
    pub async fn run(self) -> Result<(), HaverError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Stops accepting new connections; connection tasks already running
    /// carry on until their peers leave.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), HaverError> {
        tracing::info!(
            hostname = %self.config.hostname,
            version = %self.config.version,
            "haver server running"
        );
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                accepted = self.transport.accept() => accepted,
                () = &mut shutdown => break,
            };
            match accepted {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }

        self.transport.shutdown().await?;
        tracing::info!("haver server stopped");
        Ok(())
    }
}
