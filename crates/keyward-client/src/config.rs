//! Client runtime configuration.

use keyward_crypto::Scheme;
use keyward_proto::DEFAULT_MAX_FRAME_LEN;

/// Default KDC address.
pub const DEFAULT_KDC_ADDR: &str = "127.0.0.1:9000";

/// Default application server address.
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:9001";

/// Where to connect and what to ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// KDC address (`host:port`)
    pub kdc_addr: String,
    /// Application server address (`host:port`)
    pub server_addr: String,
    /// Server identity to request a ticket for
    pub server_id: String,
    /// Envelope scheme to request
    pub scheme: Scheme,
    /// Largest frame body accepted from either peer
    pub max_frame_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            kdc_addr: DEFAULT_KDC_ADDR.to_string(),
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            server_id: "S1".to_string(),
            scheme: Scheme::Aead,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}
