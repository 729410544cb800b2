//! Error types for the Keyward protocol core.
//!
//! Strongly-typed errors for each layer: transport errors (framing, I/O),
//! session errors (handshake and sequenced channel) and KDC errors (request
//! validation). Each error maps to exactly one wire `ERROR` payload so the
//! peer learns which class of failure ended the exchange.
//!
//! We avoid using `std::io::Error` for protocol logic to maintain type safety
//! and keep errors comparable in tests.

use std::{fmt, io};

use keyward_crypto::{CryptoError, Scheme};
use keyward_proto::{ErrorPayload, ProtocolError};
use thiserror::Error;

/// Errors from reading or writing framed messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Peer closed the stream before or in the middle of a frame
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Declared frame length exceeds the configured maximum
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Declared body length
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Frame body is not a valid message
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::ConnectionClosed,
            _ => Self::Io(err.to_string()),
        }
    }
}

impl From<ProtocolError> for TransportError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::FrameTooLarge { size, max } => Self::FrameTooLarge { size, max },
            other => Self::Malformed(other.to_string()),
        }
    }
}

/// Why a handshake or envelope failed authentication.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// Ticket did not open under the server's master key
    #[error("ticket rejected: {0}")]
    TicketRejected(CryptoError),

    /// Ticket was issued for another server
    #[error("ticket issued for {actual:?}, this is {expected:?}")]
    WrongServer {
        /// This server's id
        expected: String,
        /// Server id inside the ticket
        actual: String,
    },

    /// Ticket validity window has passed
    #[error("ticket expired at {expiry} (now {now})")]
    TicketExpired {
        /// Ticket expiry (Unix seconds)
        expiry: u64,
        /// Server clock at validation
        now: u64,
    },

    /// Authenticator did not open under the session keys
    #[error("authenticator rejected: {0}")]
    AuthenticatorRejected(CryptoError),

    /// Envelope or authenticator scheme differs from the ticket's
    #[error("scheme mismatch: ticket pins {pinned}, peer used {presented}")]
    SchemeMismatch {
        /// Scheme pinned in the ticket
        pinned: Scheme,
        /// Scheme the peer presented
        presented: Scheme,
    },

    /// Authenticator names a different client than the ticket
    #[error("authenticator client {authenticator:?} does not match ticket client {ticket:?}")]
    ClientMismatch {
        /// Client id inside the ticket
        ticket: String,
        /// Client id inside the authenticator
        authenticator: String,
    },

    /// Authenticator timestamp is outside the skew window
    #[error("authenticator timestamp {timestamp} outside ±{max_skew}s of {now}")]
    StaleAuthenticator {
        /// Authenticator timestamp (Unix seconds)
        timestamp: u64,
        /// Server clock at validation
        now: u64,
        /// Configured skew allowance in seconds
        max_skew: u64,
    },

    /// Identical AUTH already accepted on another connection
    #[error("authenticator from {client_id:?} at {timestamp} already used")]
    ReplayedAuthenticator {
        /// Client id inside the authenticator
        client_id: String,
        /// Authenticator timestamp (Unix seconds)
        timestamp: u64,
    },

    /// DATA envelope failed verification under the session keys
    #[error("envelope rejected: {0}")]
    EnvelopeRejected(CryptoError),
}

/// Coarse classification of a [`SessionError`], stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Peer sent something the protocol does not allow
    ProtocolViolation,
    /// Cryptographic or credential check failed
    AuthenticationFailure,
    /// Sequence counter mismatch
    SequenceViolation,
    /// Valid message at the wrong time, connection continues
    UnexpectedMessage,
    /// Local failure unrelated to the peer's behaviour
    Internal,
    /// Stream or framing failure
    Transport,
}

impl ErrorKind {
    /// Stable name for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProtocolViolation => "protocol_violation",
            Self::AuthenticationFailure => "authentication_failure",
            Self::SequenceViolation => "sequence_violation",
            Self::UnexpectedMessage => "unexpected_message",
            Self::Internal => "internal",
            Self::Transport => "transport",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the server session state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Message not allowed in the current state, or undecodable payload
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Ticket, authenticator or envelope check failed
    #[error("authentication failure: {0}")]
    Authentication(#[from] AuthFailure),

    /// Counter in a DATA payload did not match
    #[error("sequence violation: expected {expected}, received {received}")]
    SequenceViolation {
        /// Counter the receiver expected
        expected: u64,
        /// Counter carried in the payload
        received: u64,
    },

    /// Message type not handled in the current state (non-fatal)
    #[error("unexpected {message_type} message")]
    UnexpectedMessage {
        /// Wire type name of the offending message
        message_type: &'static str,
    },

    /// Local failure while building a reply
    #[error("internal error: {0}")]
    Internal(String),

    /// Stream or framing failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// Classification for logging and auditing.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
            Self::Authentication(_) => ErrorKind::AuthenticationFailure,
            Self::SequenceViolation { .. } => ErrorKind::SequenceViolation,
            Self::UnexpectedMessage { .. } => ErrorKind::UnexpectedMessage,
            Self::Internal(_) => ErrorKind::Internal,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Returns true if this error ends the connection.
    ///
    /// Only an out-of-place message type is survivable. Everything else
    /// indicates a broken or malicious peer, or a session that can no longer
    /// be trusted.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::UnexpectedMessage { .. })
    }

    /// Structured wire error for this failure.
    pub fn to_error_payload(&self) -> ErrorPayload {
        match self {
            Self::ProtocolViolation(reason) => ErrorPayload::protocol_violation(reason.clone()),
            Self::Authentication(failure) => {
                ErrorPayload::authentication_failure(failure.to_string())
            },
            Self::SequenceViolation { expected, received } => {
                ErrorPayload::sequence_violation(*expected, *received)
            },
            Self::UnexpectedMessage { message_type } => {
                ErrorPayload::unexpected_message(message_type)
            },
            Self::Internal(_) | Self::Transport(_) => ErrorPayload::internal("internal error"),
        }
    }
}

/// Errors raised while validating a key request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KdcError {
    /// Request is not a well-formed `KEY_REQUEST`
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Requested scheme is not supported
    #[error("unknown scheme: {0:?}")]
    UnknownScheme(String),

    /// Requested server is not registered with this KDC
    #[error("unknown server: {0:?}")]
    UnknownPrincipal(String),

    /// Sealing the ticket or package failed
    #[error("internal error: {0}")]
    Internal(#[from] CryptoError),
}

impl KdcError {
    /// Structured wire error for this failure.
    pub fn to_error_payload(&self) -> ErrorPayload {
        match self {
            Self::ProtocolViolation(reason) => ErrorPayload::protocol_violation(reason.clone()),
            Self::UnknownScheme(name) => ErrorPayload::unknown_scheme(name),
            Self::UnknownPrincipal(id) => ErrorPayload::unknown_principal(id),
            Self::Internal(_) => ErrorPayload::internal("ticket issuance failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_session_error_maps_to_its_wire_code() {
        let cases = [
            (SessionError::ProtocolViolation("x".into()), ErrorPayload::PROTOCOL_VIOLATION),
            (
                SessionError::Authentication(AuthFailure::TicketExpired { expiry: 1, now: 2 }),
                ErrorPayload::AUTHENTICATION_FAILURE,
            ),
            (
                SessionError::SequenceViolation { expected: 3, received: 4 },
                ErrorPayload::SEQUENCE_VIOLATION,
            ),
            (
                SessionError::UnexpectedMessage { message_type: "AUTH" },
                ErrorPayload::UNEXPECTED_MESSAGE,
            ),
            (SessionError::Internal("x".into()), ErrorPayload::INTERNAL),
        ];

        for (error, code) in cases {
            assert_eq!(error.to_error_payload().code, code, "{error}");
        }
    }

    #[test]
    fn only_unexpected_message_is_survivable() {
        assert!(!SessionError::UnexpectedMessage { message_type: "OK" }.is_fatal());
        assert!(SessionError::ProtocolViolation("x".into()).is_fatal());
        assert!(SessionError::SequenceViolation { expected: 1, received: 2 }.is_fatal());
        assert!(SessionError::Transport(TransportError::ConnectionClosed).is_fatal());
    }

    #[test]
    fn crypto_failures_keep_their_kind() {
        let err: SessionError = AuthFailure::EnvelopeRejected(CryptoError::AuthenticationFailed {
            reason: "MAC mismatch".into(),
        })
        .into();

        assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
        assert!(err.to_string().contains("MAC mismatch"));
    }

    #[test]
    fn internal_details_stay_local() {
        let payload = SessionError::Internal("seal failed: key state".into()).to_error_payload();
        assert!(!payload.error.contains("key state"));
    }

    #[test]
    fn eof_is_a_closed_connection() {
        let err: TransportError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert_eq!(err, TransportError::ConnectionClosed);
    }

    #[test]
    fn oversized_frame_keeps_sizes() {
        let err: TransportError = ProtocolError::FrameTooLarge { size: 10, max: 5 }.into();
        assert_eq!(err, TransportError::FrameTooLarge { size: 10, max: 5 });
    }

    #[test]
    fn kdc_errors_map_to_wire_codes() {
        assert_eq!(
            KdcError::UnknownScheme("DES".into()).to_error_payload().code,
            ErrorPayload::UNKNOWN_SCHEME
        );
        assert_eq!(
            KdcError::UnknownPrincipal("S9".into()).to_error_payload().code,
            ErrorPayload::UNKNOWN_PRINCIPAL
        );
        assert_eq!(
            KdcError::ProtocolViolation("empty".into()).to_error_payload().code,
            ErrorPayload::PROTOCOL_VIOLATION
        );
    }
}
