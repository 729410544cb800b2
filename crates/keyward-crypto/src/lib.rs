//! Keyward Cryptographic Primitives
//!
//! Envelope schemes and key material for Keyward. Pure functions with
//! deterministic outputs. Callers provide random bytes for deterministic
//! testing.
//!
//! # Key Hierarchy
//!
//! ```text
//! Passphrase ──HKDF──> MasterKey (client)      MasterKey (server)
//!                          │                          │
//!                          ▼                          ▼
//!               Credential package            Ticket (opaque to client)
//!                          │                          │
//!                          └──────> SessionKeySet <───┘
//!                                        │
//!                                        ▼
//!                           Envelope (AEAD | MAC_THEN_ENCRYPT)
//! ```
//!
//! Master keys only ever seal tickets and credential packages. Session keys
//! are minted per KDC request and protect the authenticator and every
//! application message of one connection.
//!
//! # Security
//!
//! Authenticity:
//! - AEAD: `XChaCha20-Poly1305`, random 192-bit nonce, failed tag -> reject
//! - MAC-then-encrypt: HMAC-SHA256 over `iv || ciphertext`, verified in
//!   constant time before AES-256-CBC decryption is attempted
//!
//! Hygiene:
//! - Key types zeroize on drop and redact themselves in `Debug`
//! - Unknown scheme names fail at parse time, never inside a cipher call

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod aead;
mod cbc_hmac;
mod envelope;
mod error;
mod keys;
mod scheme;

pub use aead::{NONCE_SIZE, TAG_SIZE};
pub use cbc_hmac::{IV_SIZE, MAC_SIZE};
pub use envelope::{Envelope, SEAL_RANDOM_SIZE, open_payload, open_payload_as, seal_payload};
pub use error::CryptoError;
pub use keys::{KEY_SIZE, MasterKey, SESSION_KEY_MATERIAL_SIZE, SessionKeySet};
pub use scheme::Scheme;
