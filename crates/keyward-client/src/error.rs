//! Client error types.

use keyward_core::TransportError;
use keyward_crypto::CryptoError;
use thiserror::Error;

/// Errors that can occur in client operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Peer answered with an ERROR message.
    #[error("rejected by peer ({code:#06x}): {error}")]
    Rejected {
        /// Wire error code
        code: u16,
        /// Peer's description
        error: String,
    },

    /// Sealed material from the peer failed verification.
    ///
    /// Covers a credential package that does not open under our master key
    /// and replies that do not open under the session keys.
    #[error("authentication failed: {0}")]
    Authentication(CryptoError),

    /// Credentials expired before they could be used.
    #[error("credentials expired at {expiry} (now {now})")]
    CredentialsExpired {
        /// Expiry (Unix seconds)
        expiry: u64,
        /// Local clock
        now: u64,
    },

    /// Peer sent a message type that is not valid here.
    #[error("unexpected {actual} message, expected {expected}")]
    UnexpectedMessage {
        /// Wire type we were waiting for
        expected: &'static str,
        /// Wire type we received
        actual: &'static str,
    },

    /// Reply counter did not follow our request counter.
    #[error("sequence violation: expected counter {expected}, got {received}")]
    SequenceViolation {
        /// Counter we expected on the reply
        expected: u64,
        /// Counter the reply carried
        received: u64,
    },

    /// Authenticated plaintext did not decode.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Operation not valid in the current client state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Local crypto failure while sealing.
    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    /// Stream or framing failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ClientError {
    /// Map a failure to open peer-sealed material.
    pub(crate) fn from_open(err: CryptoError) -> Self {
        match err {
            CryptoError::MalformedPayload(reason) => Self::Malformed(reason),
            other => Self::Authentication(other),
        }
    }
}
