//! Application payloads.
//!
//! Every application message travels as a [`Data`] frame whose envelope
//! decrypts to an [`AppPayload`]. The counter inside the payload is
//! authenticated along with the text, so it cannot be rewritten in transit.

use keyward_crypto::Envelope;
use serde::{Deserialize, Serialize};

/// Encrypted application message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    /// `AppPayload` sealed under the session keys with the pinned scheme
    pub envelope: Envelope,
}

/// Plaintext carried inside a [`Data`] envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPayload {
    /// Sequence counter. Requests and replies share one counter per
    /// connection, starting at 1.
    pub counter: u64,
    /// Message text
    pub text: String,
}

impl AppPayload {
    /// Create a payload.
    pub fn new(counter: u64, text: impl Into<String>) -> Self {
        Self { counter, text: text.into() }
    }
}
