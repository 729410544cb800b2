//! Long-term and per-session key material.
//!
//! Neither key type implements a revealing `Debug`: session keys must never
//! reach a log line, and formatting a struct that embeds them prints a
//! placeholder instead.

use std::fmt;

use hkdf::Hkdf;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{CryptoError, Envelope, SEAL_RANDOM_SIZE, aead, envelope};

/// Size of every symmetric key in bytes.
pub const KEY_SIZE: usize = 32;

/// Random bytes consumed by [`SessionKeySet::from_random`].
pub const SESSION_KEY_MATERIAL_SIZE: usize = 3 * KEY_SIZE;

/// Label used for passphrase-based master key derivation
const MASTER_KEY_LABEL: &[u8] = b"keywardMasterV1";

/// Salt used for passphrase-based master key derivation
const MASTER_KEY_SALT: &[u8] = b"keyward-kdc";

/// Long-term key bound to one identity (client or server).
///
/// Derived once at startup and shared read-only by every worker. Never
/// transmitted; only used to seal tickets and credential packages.
#[derive(Clone)]
pub struct MasterKey {
    key: [u8; KEY_SIZE],
}

impl MasterKey {
    /// Derive a master key from a passphrase.
    ///
    /// Deterministic: the KDC and the key owner derive the same key from the
    /// same passphrase without exchanging it.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let hkdf = Hkdf::<Sha256>::new(Some(MASTER_KEY_SALT), passphrase.as_bytes());

        let mut key = [0u8; KEY_SIZE];
        let Ok(()) = hkdf.expand(MASTER_KEY_LABEL, &mut key) else {
            unreachable!("32 bytes is a valid HKDF-SHA256 output length");
        };

        Self { key }
    }

    /// Wrap raw key bytes.
    pub fn from_bytes(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Seal a structured payload under this key.
    ///
    /// Long-term keys always use the AEAD scheme.
    pub fn seal<T: Serialize>(
        &self,
        payload: &T,
        random: [u8; SEAL_RANDOM_SIZE],
    ) -> Result<Envelope, CryptoError> {
        let plaintext = envelope::encode_payload(payload)?;
        Ok(aead::seal(&self.key, &plaintext, random))
    }

    /// Open an envelope sealed with [`MasterKey::seal`].
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailed` if the envelope was sealed under another key
    ///   or tampered with
    /// - `SchemeMismatch` if the envelope is not an AEAD envelope
    /// - `MalformedPayload` if the plaintext is not a `T`
    pub fn open<T: DeserializeOwned>(&self, sealed: &Envelope) -> Result<T, CryptoError> {
        let plaintext = aead::open(&self.key, sealed)?;
        envelope::decode_payload(&plaintext)
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// Fresh keys for every supported scheme, minted by the KDC per request.
///
/// Travels inside the ticket (for the server) and the credential package
/// (for the client). Lives only as long as the connection that uses it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKeySet {
    /// Key for the AEAD scheme
    aead_key: [u8; KEY_SIZE],
    /// Block cipher key for the MAC-then-encrypt scheme
    cipher_key: [u8; KEY_SIZE],
    /// Independent MAC key for the MAC-then-encrypt scheme
    mac_key: [u8; KEY_SIZE],
}

impl SessionKeySet {
    /// Build a key set from caller-provided random bytes.
    ///
    /// Caller MUST provide cryptographically secure random bytes in
    /// production.
    pub fn from_random(mut random: [u8; SESSION_KEY_MATERIAL_SIZE]) -> Self {
        let mut keys = Self {
            aead_key: [0u8; KEY_SIZE],
            cipher_key: [0u8; KEY_SIZE],
            mac_key: [0u8; KEY_SIZE],
        };

        keys.aead_key.copy_from_slice(&random[..KEY_SIZE]);
        keys.cipher_key.copy_from_slice(&random[KEY_SIZE..2 * KEY_SIZE]);
        keys.mac_key.copy_from_slice(&random[2 * KEY_SIZE..]);
        random.zeroize();

        keys
    }

    /// Key for the AEAD scheme.
    pub fn aead_key(&self) -> &[u8; KEY_SIZE] {
        &self.aead_key
    }

    /// Block cipher key for the MAC-then-encrypt scheme.
    pub fn cipher_key(&self) -> &[u8; KEY_SIZE] {
        &self.cipher_key
    }

    /// MAC key for the MAC-then-encrypt scheme.
    pub fn mac_key(&self) -> &[u8; KEY_SIZE] {
        &self.mac_key
    }
}

impl Drop for SessionKeySet {
    fn drop(&mut self) {
        self.aead_key.zeroize();
        self.cipher_key.zeroize();
        self.mac_key.zeroize();
    }
}

impl fmt::Debug for SessionKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKeySet([REDACTED])")
    }
}
