//! CBOR-encoded protocol messages.
//!
//! Every message is a CBOR map whose `type` field names the variant. The
//! variant-specific fields sit next to the tag in the same map. A `type` this
//! build does not recognise decodes to [`Message::Unknown`] instead of
//! failing, so the session layer can answer it without dropping the
//! connection.
//!
//! # Invariants
//!
//! Each variant maps to exactly one `type` string (enforced by serde's
//! rename rules and checked by [`Message::type_name`] tests). Round-trip
//! encoding must produce identical values.

pub mod app;
pub mod kdc;
pub mod session;

use bytes::{BufMut, Bytes};
use serde::{Deserialize, Serialize};

use crate::{
    Frame,
    errors::{ProtocolError, Result},
};

/// All messages exchanged between client, KDC and server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    // Key Distribution
    /// Client asks the KDC for a ticket
    KeyRequest(kdc::KeyRequest),
    /// KDC returns the sealed credential package
    KeyResponse(kdc::KeyResponse),

    // Handshake
    /// Client presents ticket and authenticator
    Auth(session::Auth),
    /// Server accepts the handshake
    #[serde(rename = "OK")]
    AuthOk(session::AuthOk),

    // Application
    /// Encrypted, sequenced application message
    Data(app::Data),
    /// Graceful close, echoed by the peer
    Bye,

    // Errors
    /// Structured error reply
    Error(ErrorPayload),

    /// Any `type` this build does not recognise
    #[serde(other)]
    Unknown,
}

/// Error payload for ERROR messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error code identifying the type of error.
    pub code: u16,
    /// Human-readable error message.
    pub error: String,
}

impl ErrorPayload {
    /// Message was not valid at this point of the protocol.
    pub const PROTOCOL_VIOLATION: u16 = 0x0001;
    /// Ticket, authenticator or envelope failed verification.
    pub const AUTHENTICATION_FAILURE: u16 = 0x0002;
    /// Sequence counter did not match the expected value.
    pub const SEQUENCE_VIOLATION: u16 = 0x0003;
    /// Requested envelope scheme is not supported.
    pub const UNKNOWN_SCHEME: u16 = 0x0004;
    /// Requested server is not known to the KDC.
    pub const UNKNOWN_PRINCIPAL: u16 = 0x0005;
    /// Message type not handled in the current state. The connection stays
    /// open.
    pub const UNEXPECTED_MESSAGE: u16 = 0x0006;
    /// Internal failure on the sending side.
    pub const INTERNAL: u16 = 0x00FF;

    /// Create a protocol violation error.
    pub fn protocol_violation(reason: impl Into<String>) -> Self {
        Self { code: Self::PROTOCOL_VIOLATION, error: reason.into() }
    }

    /// Create an authentication failure error.
    pub fn authentication_failure(reason: impl Into<String>) -> Self {
        Self { code: Self::AUTHENTICATION_FAILURE, error: reason.into() }
    }

    /// Create a sequence violation error naming both counters.
    pub fn sequence_violation(expected: u64, received: u64) -> Self {
        Self {
            code: Self::SEQUENCE_VIOLATION,
            error: format!("sequence violation: expected counter {expected}, got {received}"),
        }
    }

    /// Create an unknown scheme error.
    pub fn unknown_scheme(name: &str) -> Self {
        Self { code: Self::UNKNOWN_SCHEME, error: format!("unknown scheme: {name}") }
    }

    /// Create an unknown principal error.
    pub fn unknown_principal(id: &str) -> Self {
        Self { code: Self::UNKNOWN_PRINCIPAL, error: format!("unknown server: {id}") }
    }

    /// Create an unexpected message error.
    pub fn unexpected_message(type_name: &str) -> Self {
        Self {
            code: Self::UNEXPECTED_MESSAGE,
            error: format!("unexpected message type: {type_name}"),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self { code: Self::INTERNAL, error: msg.into() }
    }

    /// Whether the sender closes the connection after this error.
    pub fn is_fatal(&self) -> bool {
        self.code != Self::UNEXPECTED_MESSAGE
    }
}

impl Message {
    /// Wire name of this message's `type` field.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::KeyRequest(_) => "KEY_REQUEST",
            Self::KeyResponse(_) => "KEY_RESPONSE",
            Self::Auth(_) => "AUTH",
            Self::AuthOk(_) => "OK",
            Self::Data(_) => "DATA",
            Self::Bye => "BYE",
            Self::Error(_) => "ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Encode the message body as CBOR into `dst`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        ciborium::ser::into_writer(self, dst.writer())
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))
    }

    /// Decode a message body.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborDecode` if the bytes are not a valid message map
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
    }

    /// Convert the message into a transport frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn into_frame(self) -> Result<Frame> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(Frame::new(Bytes::from(buf)))
    }

    /// Parse a message from a transport frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborDecode` if the body is not a valid message
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        Self::decode(&frame.body)
    }
}

#[cfg(test)]
mod tests {
    use keyward_crypto::{SEAL_RANDOM_SIZE, SESSION_KEY_MATERIAL_SIZE, Scheme, SessionKeySet};

    use super::*;

    fn envelope() -> keyward_crypto::Envelope {
        let keys = SessionKeySet::from_random([7; SESSION_KEY_MATERIAL_SIZE]);
        keyward_crypto::seal_payload(Scheme::Aead, &keys, &"x", [1; SEAL_RANDOM_SIZE]).unwrap()
    }

    fn type_field(message: &Message) -> String {
        let mut buf = Vec::new();
        message.encode(&mut buf).unwrap();
        let value: ciborium::Value = ciborium::de::from_reader(buf.as_slice()).unwrap();
        value
            .as_map()
            .unwrap()
            .iter()
            .find(|(k, _)| k.as_text() == Some("type"))
            .and_then(|(_, v)| v.as_text())
            .unwrap()
            .to_string()
    }

    fn all_messages() -> Vec<Message> {
        vec![
            Message::KeyRequest(kdc::KeyRequest {
                client_id: "C1".into(),
                server_id: "S1".into(),
                scheme: "AEAD".into(),
            }),
            Message::KeyResponse(kdc::KeyResponse { encrypted_client_package: envelope() }),
            Message::Auth(session::Auth { ticket: envelope(), authenticator: envelope() }),
            Message::AuthOk(session::AuthOk { message: "welcome".into() }),
            Message::Data(app::Data { envelope: envelope() }),
            Message::Bye,
            Message::Error(ErrorPayload::protocol_violation("nope")),
        ]
    }

    #[test]
    fn type_tag_matches_type_name() {
        for message in all_messages() {
            assert_eq!(type_field(&message), message.type_name());
        }
    }

    #[test]
    fn frame_round_trip() {
        for message in all_messages() {
            let frame = message.clone().into_frame().unwrap();
            assert_eq!(Message::from_frame(&frame).unwrap(), message);
        }
    }

    #[test]
    fn unrecognised_type_decodes_to_unknown() {
        let value = ciborium::Value::Map(vec![
            (ciborium::Value::Text("type".into()), ciborium::Value::Text("PING".into())),
            (ciborium::Value::Text("extra".into()), ciborium::Value::Integer(1.into())),
        ]);
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&value, &mut buf).unwrap();

        assert_eq!(Message::decode(&buf).unwrap(), Message::Unknown);
    }

    #[test]
    fn missing_type_is_a_decode_error() {
        let value = ciborium::Value::Map(vec![(
            ciborium::Value::Text("message".into()),
            ciborium::Value::Text("hi".into()),
        )]);
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&value, &mut buf).unwrap();

        assert!(matches!(Message::decode(&buf), Err(ProtocolError::CborDecode(_))));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(Message::decode(&[0xFF, 0x00, 0x13]), Err(ProtocolError::CborDecode(_))));
    }

    #[test]
    fn only_unexpected_message_is_non_fatal() {
        assert!(!ErrorPayload::unexpected_message("DATA").is_fatal());
        assert!(ErrorPayload::protocol_violation("x").is_fatal());
        assert!(ErrorPayload::authentication_failure("x").is_fatal());
        assert!(ErrorPayload::sequence_violation(3, 5).is_fatal());
        assert!(ErrorPayload::internal("x").is_fatal());
    }

    #[test]
    fn sequence_violation_names_both_counters() {
        let payload = ErrorPayload::sequence_violation(3, 5);
        assert_eq!(payload.code, ErrorPayload::SEQUENCE_VIOLATION);
        assert!(payload.error.contains('3') && payload.error.contains('5'));
    }
}
