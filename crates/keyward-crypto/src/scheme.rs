//! Supported envelope schemes.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::CryptoError;

/// Envelope scheme.
///
/// A closed set. Scheme names arriving from the network or the command line
/// are parsed once with [`Scheme::from_str`]; everything below that boundary
/// works with the enum and never sees an unknown name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    /// `XChaCha20-Poly1305` authenticated encryption.
    #[serde(rename = "AEAD")]
    Aead,
    /// AES-256-CBC with an HMAC-SHA256 over `iv || ciphertext`.
    #[serde(rename = "MAC_THEN_ENCRYPT")]
    MacThenEncrypt,
}

impl Scheme {
    /// All supported schemes.
    pub const ALL: [Self; 2] = [Self::Aead, Self::MacThenEncrypt];

    /// Canonical wire name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aead => "AEAD",
            Self::MacThenEncrypt => "MAC_THEN_ENCRYPT",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scheme {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scheme| scheme.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CryptoError::UnknownScheme(s.to_string()))
    }
}
