//! Handshake payloads.

use keyward_crypto::Envelope;
use serde::{Deserialize, Serialize};

/// Client handshake: the ticket from the KDC plus a fresh authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    /// Ticket sealed under the server's master key (opaque to the client)
    pub ticket: Envelope,
    /// Authenticator sealed under the session keys
    pub authenticator: Envelope,
}

/// Server acknowledgement of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOk {
    /// Human-readable greeting
    pub message: String,
}
