//! AEAD scheme using `XChaCha20-Poly1305`.
//!
//! All functions are pure - the nonce must be provided by the caller. The
//! 192-bit nonce space makes random nonces safe without coordination between
//! peers.

use chacha20poly1305::{
    Tag, XChaCha20Poly1305, XNonce,
    aead::{AeadInPlace, KeyInit},
};

use crate::{CryptoError, Envelope, Scheme, keys::KEY_SIZE};

/// `XChaCha20` nonce size (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Encrypt `plaintext` under `key`, returning an AEAD envelope with a detached
/// tag.
pub(crate) fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8], nonce: [u8; NONCE_SIZE]) -> Envelope {
    let cipher = XChaCha20Poly1305::new(key.into());
    let mut buffer = plaintext.to_vec();

    let Ok(detached) =
        cipher.encrypt_in_place_detached(XNonce::from_slice(&nonce), &[], buffer.as_mut_slice())
    else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&detached);

    Envelope::Aead { nonce, ciphertext: buffer, tag }
}

/// Decrypt an AEAD envelope.
///
/// # Errors
///
/// - `SchemeMismatch` if the envelope is not an AEAD envelope
/// - `AuthenticationFailed` if the tag does not verify (wrong key or tamper)
pub(crate) fn open(key: &[u8; KEY_SIZE], envelope: &Envelope) -> Result<Vec<u8>, CryptoError> {
    let Envelope::Aead { nonce, ciphertext, tag } = envelope else {
        return Err(CryptoError::SchemeMismatch {
            expected: Scheme::Aead,
            actual: envelope.scheme(),
        });
    };

    let cipher = XChaCha20Poly1305::new(key.into());
    let mut buffer = ciphertext.clone();

    cipher
        .decrypt_in_place_detached(
            XNonce::from_slice(nonce),
            &[],
            buffer.as_mut_slice(),
            Tag::from_slice(tag),
        )
        .map_err(|_| CryptoError::AuthenticationFailed {
            reason: "AEAD tag mismatch".to_string(),
        })?;

    Ok(buffer)
}
