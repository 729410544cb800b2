//! Immutable runtime configuration.
//!
//! Built once at startup and shared behind an `Arc`. Master keys live here
//! and nowhere else.

use std::time::Duration;

use keyward_crypto::MasterKey;
use keyward_proto::DEFAULT_MAX_FRAME_LEN;

/// Lifetime of an issued ticket.
pub const DEFAULT_TICKET_LIFETIME: Duration = Duration::from_secs(300);

/// Maximum distance between an authenticator's timestamp and the server
/// clock, in either direction.
pub const DEFAULT_MAX_CLOCK_SKEW: Duration = Duration::from_secs(30);

/// Passphrase the binaries fall back to for the client master key.
///
/// Shared by every demo deployment. Never use it outside local testing.
pub const DEMO_CLIENT_PASSPHRASE: &str = "CLIENT_MASTER_KEY_DEMO";

/// Passphrase the binaries fall back to for the server master key.
pub const DEMO_SERVER_PASSPHRASE: &str = "SERVER_MASTER_KEY_DEMO";

/// KDC configuration.
#[derive(Debug, Clone)]
pub struct KdcConfig {
    /// Key shared with clients, seals credential packages
    pub client_key: MasterKey,
    /// Key shared with the application server, seals tickets
    pub server_key: MasterKey,
    /// The only server this KDC issues tickets for
    pub server_id: String,
    /// Ticket validity window
    pub ticket_lifetime: Duration,
    /// Largest frame body accepted from a client
    pub max_frame_len: usize,
}

impl KdcConfig {
    /// Create a configuration with default lifetime and frame limit.
    pub fn new(client_key: MasterKey, server_key: MasterKey, server_id: impl Into<String>) -> Self {
        Self {
            client_key,
            server_key,
            server_id: server_id.into(),
            ticket_lifetime: DEFAULT_TICKET_LIFETIME,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Override the ticket lifetime.
    #[must_use]
    pub fn with_ticket_lifetime(mut self, lifetime: Duration) -> Self {
        self.ticket_lifetime = lifetime;
        self
    }

    /// Override the frame limit.
    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }
}

/// Application server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// This server's identity, checked against every ticket
    pub server_id: String,
    /// Key shared with the KDC, opens tickets
    pub server_key: MasterKey,
    /// Authenticator freshness window
    pub max_clock_skew: Duration,
    /// Largest frame body accepted from a client
    pub max_frame_len: usize,
}

impl ServerConfig {
    /// Create a configuration with default skew and frame limit.
    pub fn new(server_id: impl Into<String>, server_key: MasterKey) -> Self {
        Self {
            server_id: server_id.into(),
            server_key,
            max_clock_skew: DEFAULT_MAX_CLOCK_SKEW,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Override the clock skew allowance.
    #[must_use]
    pub fn with_max_clock_skew(mut self, skew: Duration) -> Self {
        self.max_clock_skew = skew;
        self
    }

    /// Override the frame limit.
    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }
}
