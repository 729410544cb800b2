//! Client flows against the in-process KDC and server state machines.
//!
//! No sockets except where noted: messages are passed by hand between the
//! sans-IO halves, which keeps every step observable.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use keyward_client::{
    Channel, ChannelState, Client, ClientError, ClientIdentity, Connection, Credentials,
    request_credentials,
};
use keyward_core::{
    AuthFailure, CredentialPackage, EchoHandler, Environment, Kdc, KdcConfig, ReplayGuard,
    ServerConfig, ServerSession, SessionAction, SessionError, read_message, write_message,
};
use keyward_crypto::{
    CryptoError, MasterKey, SEAL_RANDOM_SIZE, SESSION_KEY_MATERIAL_SIZE, Scheme, SessionKeySet,
    seal_payload,
};
use keyward_proto::{AppPayload, Data, DEFAULT_MAX_FRAME_LEN, ErrorPayload, Message};

const T0: u64 = 1_700_000_000;

#[derive(Clone)]
struct FlowEnv {
    clock: Arc<AtomicU64>,
    rng: Arc<AtomicU64>,
}

impl FlowEnv {
    fn new() -> Self {
        Self { clock: Arc::new(AtomicU64::new(T0)), rng: Arc::new(AtomicU64::new(0)) }
    }

    fn advance(&self, secs: u64) {
        self.clock.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Environment for FlowEnv {
    fn wall_clock_secs(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        let call = self.rng.fetch_add(1, Ordering::SeqCst).to_le_bytes();
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = call[i % 8].wrapping_add((i as u8).wrapping_mul(13));
        }
    }
}

fn kdc(env: &FlowEnv) -> Kdc<FlowEnv> {
    let config = KdcConfig::new(
        MasterKey::from_passphrase("client"),
        MasterKey::from_passphrase("server"),
        "S1",
    );
    Kdc::new(config, env.clone())
}

fn server_sharing(env: &FlowEnv, replay: &ReplayGuard) -> ServerSession<FlowEnv, EchoHandler> {
    let config = ServerConfig::new("S1", MasterKey::from_passphrase("server"));
    ServerSession::new(Arc::new(config), replay.clone(), env.clone(), EchoHandler)
}

fn server(env: &FlowEnv) -> ServerSession<FlowEnv, EchoHandler> {
    server_sharing(env, &ReplayGuard::new())
}

fn client(env: &FlowEnv) -> Client<FlowEnv> {
    Client::new(env.clone(), ClientIdentity::from_passphrase("C1", "client"))
}

/// Deliver `message` to the server and return the single message it sends.
fn exchange(server: &mut ServerSession<FlowEnv, EchoHandler>, message: Message) -> Message {
    let actions = server.handle_message(message);
    match actions.into_iter().next() {
        Some(SessionAction::Send(reply)) => reply,
        other => panic!("expected Send, got {other:?}"),
    }
}

fn credentials(env: &FlowEnv, client: &mut Client<FlowEnv>, scheme: Scheme) -> Credentials {
    let request = client.key_request("S1", scheme);
    client.accept_key_response(kdc(env).handle_request(&request)).unwrap()
}

fn channel(
    env: &FlowEnv,
    scheme: Scheme,
) -> (Channel<FlowEnv>, ServerSession<FlowEnv, EchoHandler>) {
    let mut client = client(env);
    let creds = credentials(env, &mut client, scheme);
    let mut server = server(env);

    let (auth, pending) = client.authenticate(creds).unwrap();
    let channel = client.accept_auth_reply(pending, exchange(&mut server, auth)).unwrap();
    (channel, server)
}

#[test]
fn full_session_echoes_with_shared_counter() {
    let env = FlowEnv::new();
    let (mut channel, mut server) = channel(&env, Scheme::Aead);

    assert_eq!(channel.counter(), 1);
    assert!(channel.greeting().contains("AEAD"));

    let request = channel.seal_request("hello").unwrap();
    let reply = channel.open_reply(exchange(&mut server, request)).unwrap();

    assert_eq!(reply, AppPayload::new(2, "Echo: hello"));
    assert_eq!(channel.counter(), 3);

    let request = channel.seal_request("again").unwrap();
    let reply = channel.open_reply(exchange(&mut server, request)).unwrap();
    assert_eq!(reply.counter, 4);
    assert_eq!(channel.counter(), 5);

    let bye = channel.bye().unwrap();
    assert_eq!(channel.state(), ChannelState::Closing);
    channel.accept_bye(exchange(&mut server, bye)).unwrap();
    assert_eq!(channel.state(), ChannelState::Closed);
}

#[test]
fn mac_then_encrypt_session_works_end_to_end() {
    let env = FlowEnv::new();
    let (mut channel, mut server) = channel(&env, Scheme::MacThenEncrypt);

    assert_eq!(channel.scheme(), Scheme::MacThenEncrypt);
    let request = channel.seal_request("hi").unwrap();
    assert_eq!(channel.open_reply(exchange(&mut server, request)).unwrap().text, "Echo: hi");
}

#[test]
fn kdc_error_becomes_rejected() {
    let env = FlowEnv::new();
    let mut client = client(&env);

    let request = client.key_request("S9", Scheme::Aead);
    let result = client.accept_key_response(kdc(&env).handle_request(&request));

    assert!(matches!(
        result,
        Err(ClientError::Rejected { code: ErrorPayload::UNKNOWN_PRINCIPAL, .. })
    ));
}

#[test]
fn package_for_another_client_key_fails_authentication() {
    let env = FlowEnv::new();
    let mut impostor = Client::new(env.clone(), ClientIdentity::from_passphrase("C1", "guess"));

    let request = impostor.key_request("S1", Scheme::Aead);
    let result = impostor.accept_key_response(kdc(&env).handle_request(&request));

    assert!(matches!(result, Err(ClientError::Authentication(_))));
}

#[test]
fn response_without_request_is_invalid_state() {
    let env = FlowEnv::new();
    let mut client = client(&env);

    let result = client.accept_key_response(Message::Bye);
    assert!(matches!(result, Err(ClientError::InvalidState(_))));
}

#[test]
fn expired_package_rejected_on_intake() {
    let env = FlowEnv::new();
    let mut client = client(&env);

    let request = client.key_request("S1", Scheme::Aead);
    let reply = kdc(&env).handle_request(&request);
    env.advance(301);

    assert!(matches!(
        client.accept_key_response(reply),
        Err(ClientError::CredentialsExpired { expiry, now })
            if expiry == T0 + 300 && now == T0 + 301
    ));
}

#[test]
fn package_with_unrequested_scheme_rejected() {
    let env = FlowEnv::new();
    let mut client = client(&env);

    // Ask for AEAD, but feed back a response issued for MAC_THEN_ENCRYPT
    let mut other = Client::new(env.clone(), ClientIdentity::from_passphrase("C1", "client"));
    let foreign = other.key_request("S1", Scheme::MacThenEncrypt);
    let reply = kdc(&env).handle_request(&foreign);

    client.key_request("S1", Scheme::Aead);
    assert!(matches!(
        client.accept_key_response(reply),
        Err(ClientError::Authentication(CryptoError::SchemeMismatch { .. }))
    ));
}

#[test]
fn server_rejection_of_auth_surfaces_code() {
    let env = FlowEnv::new();
    let mut client = client(&env);
    let creds = credentials(&env, &mut client, Scheme::Aead);

    // Let the ticket lapse before presenting it
    env.advance(400);
    let mut server = server(&env);
    let (auth, pending) = client.authenticate(creds).unwrap();
    let result = client.accept_auth_reply(pending, exchange(&mut server, auth));

    assert!(matches!(
        result,
        Err(ClientError::Rejected { code: ErrorPayload::AUTHENTICATION_FAILURE, .. })
    ));
}

#[test]
fn pending_handshake_carries_the_consumed_credentials() {
    let env = FlowEnv::new();
    let mut client = client(&env);
    let creds = credentials(&env, &mut client, Scheme::MacThenEncrypt);

    let (auth, pending) = client.authenticate(creds).unwrap();
    assert!(matches!(auth, Message::Auth(_)));
    assert_eq!(pending.server_id(), "S1");
    assert_eq!(pending.scheme(), Scheme::MacThenEncrypt);
}

#[test]
fn captured_auth_replayed_on_second_connection_is_rejected() {
    let env = FlowEnv::new();
    let replay = ReplayGuard::new();
    let mut client = client(&env);
    let creds = credentials(&env, &mut client, Scheme::Aead);

    let (auth, pending) = client.authenticate(creds).unwrap();
    let mut first = server_sharing(&env, &replay);
    client.accept_auth_reply(pending, exchange(&mut first, auth.clone())).unwrap();

    // Same bytes on a new connection, still inside the skew window
    env.advance(1);
    let mut second = server_sharing(&env, &replay);
    let actions = second.handle_message(auth);

    assert!(matches!(
        actions.as_slice(),
        [
            SessionAction::Send(Message::Error(ErrorPayload {
                code: ErrorPayload::AUTHENTICATION_FAILURE,
                ..
            })),
            SessionAction::Abort(SessionError::Authentication(
                AuthFailure::ReplayedAuthenticator { .. }
            )),
        ]
    ));
}

#[test]
fn second_request_before_reply_is_invalid_state() {
    let env = FlowEnv::new();
    let (mut channel, _server) = channel(&env, Scheme::Aead);

    channel.seal_request("one").unwrap();
    assert!(matches!(channel.seal_request("two"), Err(ClientError::InvalidState(_))));
}

#[test]
fn bye_while_awaiting_reply_is_invalid_state() {
    let env = FlowEnv::new();
    let (mut channel, _server) = channel(&env, Scheme::Aead);

    channel.seal_request("one").unwrap();
    assert!(matches!(channel.bye(), Err(ClientError::InvalidState(_))));
    assert_eq!(channel.state(), ChannelState::AwaitingReply);
}

#[test]
fn bye_after_close_is_invalid_state() {
    let env = FlowEnv::new();
    let (mut channel, _server) = channel(&env, Scheme::Aead);

    // A failed reply closes the channel
    channel.seal_request("one").unwrap();
    channel.open_reply(Message::Bye).unwrap_err();
    assert_eq!(channel.state(), ChannelState::Closed);
    assert!(matches!(channel.bye(), Err(ClientError::InvalidState(_))));
}

#[test]
fn second_bye_is_invalid_state() {
    let env = FlowEnv::new();
    let (mut channel, _server) = channel(&env, Scheme::Aead);

    channel.bye().unwrap();
    assert!(matches!(channel.bye(), Err(ClientError::InvalidState(_))));
    assert_eq!(channel.state(), ChannelState::Closing);
}

#[test]
fn reply_with_wrong_counter_is_a_sequence_violation() {
    let env = FlowEnv::new();
    let mut client = client(&env);

    // Peek at the session keys so a reply can be forged with a skipped counter
    let request = client.key_request("S1", Scheme::Aead);
    let reply = kdc(&env).handle_request(&request);
    let Message::KeyResponse(response) = &reply else {
        panic!("expected KEY_RESPONSE, got {reply:?}");
    };
    let package: CredentialPackage =
        MasterKey::from_passphrase("client").open(&response.encrypted_client_package).unwrap();
    let creds = client.accept_key_response(reply).unwrap();

    let mut server = server(&env);
    let (auth, pending) = client.authenticate(creds).unwrap();
    let mut channel = client.accept_auth_reply(pending, exchange(&mut server, auth)).unwrap();

    let forged = Message::Data(Data {
        envelope: seal_payload(
            Scheme::Aead,
            &package.keys,
            &AppPayload::new(4, "skipped"),
            [9; SEAL_RANDOM_SIZE],
        )
        .unwrap(),
    });

    channel.seal_request("hello").unwrap();
    let result = channel.open_reply(forged);

    assert_eq!(result, Err(ClientError::SequenceViolation { expected: 2, received: 4 }));
    assert_eq!(channel.state(), ChannelState::Closed);
}

#[test]
fn reply_under_other_scheme_fails_authentication() {
    let env = FlowEnv::new();
    let (mut channel, _server) = channel(&env, Scheme::Aead);

    let foreign = Message::Data(Data {
        envelope: seal_payload(
            Scheme::MacThenEncrypt,
            &SessionKeySet::from_random([1; SESSION_KEY_MATERIAL_SIZE]),
            &AppPayload::new(2, "x"),
            [0; SEAL_RANDOM_SIZE],
        )
        .unwrap(),
    });

    channel.seal_request("hello").unwrap();
    assert!(matches!(
        channel.open_reply(foreign),
        Err(ClientError::Authentication(CryptoError::SchemeMismatch { .. }))
    ));
    assert_eq!(channel.state(), ChannelState::Closed);
}

#[tokio::test]
async fn async_driver_runs_over_duplex_streams() {
    let env = FlowEnv::new();

    // KDC side
    let (mut kdc_client_end, mut kdc_server_end) = tokio::io::duplex(64 * 1024);
    let kdc = kdc(&env);
    let kdc_task = tokio::spawn(async move {
        let request = read_message(&mut kdc_server_end, DEFAULT_MAX_FRAME_LEN).await.unwrap();
        write_message(&mut kdc_server_end, &kdc.handle_request(&request)).await.unwrap();
    });

    let mut client = client(&env);
    let creds = request_credentials(
        &mut kdc_client_end,
        &mut client,
        "S1",
        Scheme::Aead,
        DEFAULT_MAX_FRAME_LEN,
    )
    .await
    .unwrap();
    kdc_task.await.unwrap();

    // Server side
    let (client_end, mut server_end) = tokio::io::duplex(64 * 1024);
    let mut session = server(&env);
    let server_task = tokio::spawn(async move {
        loop {
            let Ok(message) = read_message(&mut server_end, DEFAULT_MAX_FRAME_LEN).await else {
                return;
            };
            for action in session.handle_message(message) {
                match action {
                    SessionAction::Send(reply) => {
                        write_message(&mut server_end, &reply).await.unwrap();
                    },
                    SessionAction::Close | SessionAction::Abort(_) => return,
                }
            }
        }
    });

    let mut connection =
        Connection::establish(client_end, &client, creds, DEFAULT_MAX_FRAME_LEN).await.unwrap();
    assert_eq!(connection.send("hello").await.unwrap(), "Echo: hello");
    assert_eq!(connection.send("world").await.unwrap(), "Echo: world");
    assert_eq!(connection.channel().counter(), 5);
    connection.close().await.unwrap();

    server_task.await.unwrap();
}
