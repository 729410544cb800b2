//! Self-describing ciphertext records.
//!
//! An [`Envelope`] carries its scheme tag alongside the scheme-specific
//! fields, so a holder of the right [`SessionKeySet`] can open it without
//! out-of-band metadata. Payloads are structured values: they are encoded as
//! CBOR before sealing and decoded after opening, so callers never handle raw
//! plaintext bytes.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};

use crate::{
    CryptoError, Scheme, SessionKeySet,
    aead::{self, NONCE_SIZE, TAG_SIZE},
    cbc_hmac::{self, IV_SIZE, MAC_SIZE},
};

/// Random bytes consumed by one seal operation.
///
/// The AEAD scheme uses all 24 bytes as its nonce. The MAC-then-encrypt
/// scheme uses the first 16 as its IV.
pub const SEAL_RANDOM_SIZE: usize = NONCE_SIZE;

/// Authenticated ciphertext tagged with the scheme that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme")]
pub enum Envelope {
    /// `XChaCha20-Poly1305` output with detached tag
    #[serde(rename = "AEAD")]
    Aead {
        /// Random 24-byte nonce
        nonce: [u8; NONCE_SIZE],
        /// Ciphertext (same length as plaintext)
        ciphertext: Vec<u8>,
        /// Poly1305 authentication tag
        tag: [u8; TAG_SIZE],
    },

    /// AES-256-CBC output with HMAC-SHA256 over `iv || ciphertext`
    #[serde(rename = "MAC_THEN_ENCRYPT")]
    MacThenEncrypt {
        /// Random 16-byte IV
        iv: [u8; IV_SIZE],
        /// PKCS#7-padded ciphertext
        ciphertext: Vec<u8>,
        /// HMAC-SHA256 tag
        mac: [u8; MAC_SIZE],
    },
}

impl Envelope {
    /// Scheme that produced this envelope.
    pub fn scheme(&self) -> Scheme {
        match self {
            Self::Aead { .. } => Scheme::Aead,
            Self::MacThenEncrypt { .. } => Scheme::MacThenEncrypt,
        }
    }

    /// Ciphertext bytes (excluding nonce/IV and tag/MAC).
    pub fn ciphertext(&self) -> &[u8] {
        match self {
            Self::Aead { ciphertext, .. } | Self::MacThenEncrypt { ciphertext, .. } => ciphertext,
        }
    }

    /// SHA-256 over every field, scheme tag included.
    ///
    /// Two envelopes share a fingerprint only if they are byte-identical, so
    /// a replayed envelope can be recognized without keeping it around.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.scheme().name().as_bytes());
        match self {
            Self::Aead { nonce, ciphertext, tag } => {
                hasher.update(nonce);
                hasher.update(ciphertext);
                hasher.update(tag);
            },
            Self::MacThenEncrypt { iv, ciphertext, mac } => {
                hasher.update(iv);
                hasher.update(ciphertext);
                hasher.update(mac);
            },
        }
        hasher.finalize().into()
    }
}

/// Seal a structured payload under `keys` using `scheme`.
///
/// Caller MUST provide cryptographically secure random bytes in production.
///
/// # Errors
///
/// - `Serialization` if the payload cannot be CBOR-encoded
pub fn seal_payload<T: Serialize>(
    scheme: Scheme,
    keys: &SessionKeySet,
    payload: &T,
    random: [u8; SEAL_RANDOM_SIZE],
) -> Result<Envelope, CryptoError> {
    let plaintext = encode_payload(payload)?;

    let envelope = match scheme {
        Scheme::Aead => aead::seal(keys.aead_key(), &plaintext, random),
        Scheme::MacThenEncrypt => {
            let mut iv = [0u8; IV_SIZE];
            iv.copy_from_slice(&random[..IV_SIZE]);
            cbc_hmac::seal(keys.cipher_key(), keys.mac_key(), &plaintext, iv)
        },
    };

    Ok(envelope)
}

/// Open an envelope under `keys`, dispatching on its own scheme tag.
///
/// # Errors
///
/// - `AuthenticationFailed` if the tag/MAC does not verify
/// - `DecryptionFailed` if a verified ciphertext has invalid padding
/// - `MalformedPayload` if the plaintext is not a valid `T`
pub fn open_payload<T: DeserializeOwned>(
    keys: &SessionKeySet,
    envelope: &Envelope,
) -> Result<T, CryptoError> {
    let plaintext = match envelope.scheme() {
        Scheme::Aead => aead::open(keys.aead_key(), envelope)?,
        Scheme::MacThenEncrypt => cbc_hmac::open(keys.cipher_key(), keys.mac_key(), envelope)?,
    };

    decode_payload(&plaintext)
}

/// Open an envelope that must have been sealed under `expected`.
///
/// Used once a session has pinned its scheme: an envelope of any other
/// scheme is rejected before any key is used.
///
/// # Errors
///
/// - `SchemeMismatch` if the envelope's scheme differs from `expected`
/// - Any error from [`open_payload`]
pub fn open_payload_as<T: DeserializeOwned>(
    expected: Scheme,
    keys: &SessionKeySet,
    envelope: &Envelope,
) -> Result<T, CryptoError> {
    let actual = envelope.scheme();
    if actual != expected {
        return Err(CryptoError::SchemeMismatch { expected, actual });
    }

    open_payload(keys, envelope)
}

/// CBOR-encode a payload.
pub(crate) fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>, CryptoError> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(payload, &mut buf)
        .map_err(|e| CryptoError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// CBOR-decode a payload.
pub(crate) fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CryptoError> {
    ciborium::de::from_reader(bytes).map_err(|e| CryptoError::MalformedPayload(e.to_string()))
}
