//! Keyward Protocol
//!
//! Wire format for the Keyward key distribution protocol. Messages are CBOR
//! maps tagged with a `type` field and carried in frames with a 4-byte
//! big-endian length prefix.
//!
//! # Message Flow
//!
//! ```text
//! Client ──KEY_REQUEST──> KDC
//! Client <─KEY_RESPONSE── KDC          (or ERROR)
//!
//! Client ──AUTH─────────> Server
//! Client <─OK──────────── Server       (or ERROR, then close)
//! Client ──DATA(n)──────> Server
//! Client <─DATA(n+1)───── Server       (or ERROR, then close)
//! Client ──BYE──────────> Server
//! Client <─BYE─────────── Server
//! ```
//!
//! # Security
//!
//! Framing is structural only. A decoded frame proves nothing about who sent
//! it: authenticity comes from the envelopes inside AUTH and DATA messages.
//! The length limit is enforced before the body is read, so memory use per
//! connection is bounded by the receiver's configuration.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod frame;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use frame::{DEFAULT_MAX_FRAME_LEN, Frame, LENGTH_PREFIX_SIZE};
pub use payloads::{
    ErrorPayload, Message,
    app::{AppPayload, Data},
    kdc::{KeyRequest, KeyResponse},
    session::{Auth, AuthOk},
};
