//! Fuzz target for envelope opening
//!
//! Harden envelope decoding and verification against attacker-controlled
//! input (HIGH priority)
//!
//! # Strategy
//!
//! - Raw CBOR: arbitrary bytes decoded as an `Envelope`, then opened
//! - Bit flips: a genuine envelope with one bit flipped in any field
//! - Scheme confusion: a genuine envelope opened as the other scheme
//!
//! # Invariants
//!
//! - Opening NEVER panics
//! - A modified envelope NEVER yields a payload
//! - A pinned open NEVER accepts the other scheme

#![no_main]

use arbitrary::Arbitrary;
use keyward_crypto::{
    open_payload, open_payload_as, seal_payload, Envelope, Scheme, SessionKeySet,
    SEAL_RANDOM_SIZE, SESSION_KEY_MATERIAL_SIZE,
};
use keyward_proto::AppPayload;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum EnvelopeAttack {
    RawCbor { bytes: Vec<u8> },
    BitFlip { aead: bool, text: String, field: u8, index: usize, bit: u8 },
    SchemeConfusion { aead: bool, text: String },
}

fn keys() -> SessionKeySet {
    SessionKeySet::from_random([0x3C; SESSION_KEY_MATERIAL_SIZE])
}

fn scheme(aead: bool) -> Scheme {
    if aead {
        Scheme::Aead
    } else {
        Scheme::MacThenEncrypt
    }
}

fn seal(aead: bool, text: String) -> Envelope {
    seal_payload(scheme(aead), &keys(), &AppPayload::new(1, text), [0x11; SEAL_RANDOM_SIZE])
        .expect("sealing a small payload cannot fail")
}

fn field(envelope: &mut Envelope, which: u8) -> &mut [u8] {
    match (envelope, which % 3) {
        (Envelope::Aead { nonce, .. }, 0) => nonce,
        (Envelope::Aead { ciphertext, .. }, 1) => ciphertext,
        (Envelope::Aead { tag, .. }, _) => tag,
        (Envelope::MacThenEncrypt { iv, .. }, 0) => iv,
        (Envelope::MacThenEncrypt { ciphertext, .. }, 1) => ciphertext,
        (Envelope::MacThenEncrypt { mac, .. }, _) => mac,
    }
}

fuzz_target!(|attack: EnvelopeAttack| {
    match attack {
        EnvelopeAttack::RawCbor { bytes } => {
            if let Ok(envelope) = ciborium::de::from_reader::<Envelope, _>(bytes.as_slice()) {
                let _ = open_payload::<AppPayload>(&keys(), &envelope);
            }
        },
        EnvelopeAttack::BitFlip { aead, text, field: which, index, bit } => {
            let mut envelope = seal(aead, text);
            let bytes = field(&mut envelope, which);
            if bytes.is_empty() {
                return;
            }
            let i = index % bytes.len();
            bytes[i] ^= 1 << (bit % 8);

            assert!(
                open_payload::<AppPayload>(&keys(), &envelope).is_err(),
                "modified envelope opened"
            );
        },
        EnvelopeAttack::SchemeConfusion { aead, text } => {
            let envelope = seal(aead, text);
            assert!(open_payload_as::<AppPayload>(scheme(!aead), &keys(), &envelope).is_err());
        },
    }
});
