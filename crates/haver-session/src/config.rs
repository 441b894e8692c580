//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings every session on a server shares.
///
/// `#[derive(Serialize, Deserialize)]` lets the server embed this in its
/// own config; durations use serde's `{ secs, nanos }` form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Host name announced in the `HAVER` reply.
    pub hostname: String,

    /// Server version announced in the `HAVER` reply.
    pub version: String,

    /// How long a connection may stay silent before it is sent `PING`.
    pub ping_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ping_timeout: Duration::from_secs(60),
        }
    }
}
