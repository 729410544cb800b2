//! MAC-then-encrypt scheme: AES-256-CBC with HMAC-SHA256.
//!
//! The MAC covers `iv || ciphertext` and is computed under a key independent
//! of the cipher key. Opening verifies the MAC in constant time before the
//! ciphertext is touched, so a forged envelope never reaches the padding
//! check.

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{CryptoError, Envelope, Scheme, keys::KEY_SIZE};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// CBC initialization vector size (one AES block)
pub const IV_SIZE: usize = 16;

/// AES block size
const BLOCK_SIZE: usize = 16;

/// HMAC-SHA256 output size
pub const MAC_SIZE: usize = 32;

/// Encrypt and MAC `plaintext`.
pub(crate) fn seal(
    cipher_key: &[u8; KEY_SIZE],
    mac_key: &[u8; KEY_SIZE],
    plaintext: &[u8],
    iv: [u8; IV_SIZE],
) -> Envelope {
    // PKCS#7 always adds between 1 and BLOCK_SIZE bytes
    let mut buffer = vec![0u8; plaintext.len() + BLOCK_SIZE];
    buffer[..plaintext.len()].copy_from_slice(plaintext);

    let encryptor = Aes256CbcEnc::new(cipher_key.into(), (&iv).into());
    let Ok(padded) = encryptor.encrypt_padded_mut::<Pkcs7>(&mut buffer, plaintext.len()) else {
        unreachable!("buffer always has room for a full padding block");
    };
    let ciphertext = padded.to_vec();

    let mac = compute_mac(mac_key, &iv, &ciphertext);

    Envelope::MacThenEncrypt { iv, ciphertext, mac }
}

/// Verify and decrypt a MAC-then-encrypt envelope.
///
/// # Errors
///
/// - `SchemeMismatch` if the envelope is not a MAC-then-encrypt envelope
/// - `AuthenticationFailed` if the MAC does not verify
/// - `DecryptionFailed` if the MAC verifies but padding is invalid
pub(crate) fn open(
    cipher_key: &[u8; KEY_SIZE],
    mac_key: &[u8; KEY_SIZE],
    envelope: &Envelope,
) -> Result<Vec<u8>, CryptoError> {
    let Envelope::MacThenEncrypt { iv, ciphertext, mac } = envelope else {
        return Err(CryptoError::SchemeMismatch {
            expected: Scheme::MacThenEncrypt,
            actual: envelope.scheme(),
        });
    };

    let Ok(mut verifier) = HmacSha256::new_from_slice(mac_key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    verifier.update(iv);
    verifier.update(ciphertext);
    verifier.verify_slice(mac).map_err(|_| CryptoError::AuthenticationFailed {
        reason: "MAC mismatch".to_string(),
    })?;

    let mut buffer = ciphertext.clone();
    let decryptor = Aes256CbcDec::new(cipher_key.into(), iv.into());
    let plaintext = decryptor.decrypt_padded_mut::<Pkcs7>(&mut buffer).map_err(|_| {
        CryptoError::DecryptionFailed { reason: "invalid CBC padding".to_string() }
    })?;

    Ok(plaintext.to_vec())
}

/// HMAC-SHA256 over `iv || ciphertext`.
fn compute_mac(mac_key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], ciphertext: &[u8]) -> [u8; MAC_SIZE] {
    let Ok(mut mac) = HmacSha256::new_from_slice(mac_key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(iv);
    mac.update(ciphertext);

    let mut out = [0u8; MAC_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}
