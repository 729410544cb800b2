//! Fuzz target for the server session state machine
//!
//! Ensure sequence enforcement and fatal-error handling (HIGH priority)
//!
//! # Strategy
//!
//! - Handshake: valid AUTH, AUTH with a skewed clock, AUTH after expiry
//! - Channel: DATA with correct and off-by-n counters, under either scheme
//! - Noise: BYE, KEY_REQUEST and unknown message types in any state
//!
//! # Invariants
//!
//! - A closed session emits nothing
//! - `Abort` is always the last action and always follows an ERROR `Send`
//! - The expected counter only ever moves forward, by exactly two per reply
//! - A reply's counter is the request counter plus one

#![no_main]

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use arbitrary::Arbitrary;
use keyward_core::{
    Authenticator, CredentialPackage, EchoHandler, Environment, Kdc, KdcConfig, ReplayGuard,
    ServerConfig, ServerSession, SessionAction, SessionState,
};
use keyward_crypto::{open_payload, seal_payload, MasterKey, Scheme, SEAL_RANDOM_SIZE};
use keyward_proto::{AppPayload, Auth, Data, KeyRequest, Message};
use libfuzzer_sys::fuzz_target;

const T0: u64 = 1_700_000_000;

#[derive(Clone)]
struct FuzzEnv {
    clock: Arc<AtomicU64>,
    rng: Arc<AtomicU64>,
}

impl Environment for FuzzEnv {
    fn wall_clock_secs(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        let seed = self.rng.fetch_add(1, Ordering::SeqCst).to_le_bytes();
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = seed[i % 8] ^ (i as u8);
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum SessionOp {
    Auth { skew: i8 },
    Data { counter_offset: i8, text: String },
    Advance { secs: u16 },
    Bye,
    KeyRequest,
    Unknown,
}

fuzz_target!(|input: (bool, Vec<SessionOp>)| {
    let (aead, ops) = input;
    let scheme = if aead { Scheme::Aead } else { Scheme::MacThenEncrypt };
    let env = FuzzEnv { clock: Arc::new(AtomicU64::new(T0)), rng: Arc::new(AtomicU64::new(0)) };

    let client_key = MasterKey::from_passphrase("client");
    let server_key = MasterKey::from_passphrase("server");
    let kdc = Kdc::new(KdcConfig::new(client_key.clone(), server_key.clone(), "S1"), env.clone());
    let response = kdc
        .issue(&KeyRequest {
            client_id: "C1".to_string(),
            server_id: "S1".to_string(),
            scheme: scheme.name().to_string(),
        })
        .expect("valid request must be issued");
    let package: CredentialPackage =
        client_key.open(&response.encrypted_client_package).expect("package must open");

    let config = Arc::new(ServerConfig::new("S1", server_key));
    let mut session = ServerSession::new(config, ReplayGuard::new(), env.clone(), EchoHandler);
    let mut last_expected = 0u64;

    for op in ops {
        let was_closed = session.state() == SessionState::Closed;
        let expected_before = session.expected_counter();

        let (message, request_counter) = match op {
            SessionOp::Auth { skew } => {
                let authenticator = Authenticator {
                    client_id: "C1".to_string(),
                    timestamp: env.wall_clock_secs().saturating_add_signed(i64::from(skew)),
                    scheme,
                };
                let sealed = seal_payload(
                    scheme,
                    &package.keys,
                    &authenticator,
                    env.random_array::<SEAL_RANDOM_SIZE>(),
                )
                .expect("seal");
                let ticket = package.ticket.clone();
                (Message::Auth(Auth { ticket, authenticator: sealed }), None)
            },
            SessionOp::Data { counter_offset, text } => {
                let base = expected_before.unwrap_or(1);
                let counter = base.saturating_add_signed(i64::from(counter_offset));
                let envelope = seal_payload(
                    scheme,
                    &package.keys,
                    &AppPayload::new(counter, text),
                    env.random_array::<SEAL_RANDOM_SIZE>(),
                )
                .expect("seal");
                (Message::Data(Data { envelope }), Some(counter))
            },
            SessionOp::Advance { secs } => {
                env.clock.fetch_add(u64::from(secs), Ordering::SeqCst);
                continue;
            },
            SessionOp::Bye => (Message::Bye, None),
            SessionOp::KeyRequest => (
                Message::KeyRequest(KeyRequest {
                    client_id: "C1".to_string(),
                    server_id: "S1".to_string(),
                    scheme: "AEAD".to_string(),
                }),
                None,
            ),
            SessionOp::Unknown => (Message::Unknown, None),
        };

        let actions = session.handle_message(message);

        if was_closed {
            assert!(actions.is_empty(), "closed session emitted {actions:?}");
            continue;
        }

        if let Some(pos) = actions.iter().position(|a| matches!(a, SessionAction::Abort(_))) {
            assert_eq!(pos, actions.len() - 1, "Abort must be last");
            assert!(
                pos > 0 && matches!(actions[pos - 1], SessionAction::Send(Message::Error(_))),
                "Abort must follow an ERROR"
            );
            assert_eq!(session.state(), SessionState::Closed);
        }

        if let Some(expected) = session.expected_counter() {
            assert!(expected >= last_expected, "expected counter moved backwards");
            last_expected = expected;
        }

        if let (Some(counter), Some(before), Some(after)) =
            (request_counter, expected_before, session.expected_counter())
        {
            if after != before {
                assert_eq!(counter, before);
                assert_eq!(after, before + 2);

                let Some(SessionAction::Send(Message::Data(reply))) = actions.first() else {
                    panic!("accepted DATA without a DATA reply: {actions:?}");
                };
                let payload: AppPayload =
                    open_payload(&package.keys, &reply.envelope).expect("reply opens");
                assert_eq!(payload.counter, counter + 1);
            }
        }
    }
});
