//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while framing or (de)serializing messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Declared or actual body length exceeds the configured maximum
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Length that was declared or attempted
        size: usize,
        /// Maximum permitted length
        max: usize,
    },

    /// Fewer bytes available than the length prefix declares
    #[error("frame truncated: expected {expected} body bytes, got {actual}")]
    FrameTruncated {
        /// Declared body length
        expected: usize,
        /// Body bytes actually present
        actual: usize,
    },

    /// CBOR serialization failed
    #[error("CBOR encode failed: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed
    #[error("CBOR decode failed: {0}")]
    CborDecode(String),
}
