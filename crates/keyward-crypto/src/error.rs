//! Error types for envelope operations.

use thiserror::Error;

use crate::Scheme;

/// Errors from sealing or opening an [`crate::Envelope`].
///
/// A failed tag or MAC is never folded into a generic error. Callers audit
/// authentication failures separately from malformed plaintext.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Authentication tag or MAC did not verify. No plaintext was produced.
    #[error("authentication failed: {reason}")]
    AuthenticationFailed {
        /// Which check failed
        reason: String,
    },

    /// MAC verified but the ciphertext did not decrypt to a padded block
    /// sequence. Only reachable with a matching MAC key and a mismatched
    /// cipher key.
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Description of the failure
        reason: String,
    },

    /// Plaintext authenticated but is not a valid encoding of the expected
    /// payload structure.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Payload could not be serialized before sealing.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Scheme name is not one of the supported envelope schemes.
    #[error("unknown scheme: {0:?}")]
    UnknownScheme(String),

    /// Envelope was sealed under a different scheme than the one required.
    #[error("scheme mismatch: expected {expected}, got {actual}")]
    SchemeMismatch {
        /// Scheme the caller pinned
        expected: Scheme,
        /// Scheme tagged on the envelope
        actual: Scheme,
    },
}

impl CryptoError {
    /// Returns true if the error came from a failed integrity check.
    ///
    /// Scheme mismatches count as authentication failures: the peer presented
    /// material that does not belong to the pinned session.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. } | Self::SchemeMismatch { .. })
    }
}
