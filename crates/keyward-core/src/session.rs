//! Server session state machine.
//!
//! One `ServerSession` per accepted connection. Uses the action pattern:
//! [`ServerSession::handle_message`] takes a decoded message and returns the
//! actions the driver must execute. The state machine does no I/O, which
//! keeps it deterministic under simulation.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐   AUTH (valid)   ┌───────────────┐
//! │ AwaitingAuth │─────────────────>│ Authenticated │<──┐ DATA (counter ok)
//! └──────────────┘                  └───────────────┘───┘ other type (ERROR)
//!        │                                  │
//!        │ anything else / bad AUTH         │ BYE, bad DATA, counter mismatch
//!        ↓                                  ↓
//!   ┌────────┐                         ┌────────┐
//!   │ Closed │<────────────────────────│ Closed │
//!   └────────┘                         └────────┘
//! ```
//!
//! # Sequencing
//!
//! Requests and replies share a single counter starting at 1. A request must
//! carry the next expected value. The reply carries the value after that, so
//! a well-behaved client sends 1, 3, 5, … and receives 2, 4, 6, ….

use std::sync::Arc;

use keyward_crypto::{CryptoError, SEAL_RANDOM_SIZE, Scheme, SessionKeySet, seal_payload};
use keyward_proto::{AppPayload, Auth, AuthOk, Data, Message};

use crate::{
    config::ServerConfig,
    env::Environment,
    error::{AuthFailure, SessionError},
    replay::ReplayGuard,
    ticket::{Authenticator, TicketBody},
};

/// Application logic behind an authenticated channel.
///
/// Called once per accepted DATA message with the decrypted text. The
/// returned text is sealed and sent back under the next counter value.
pub trait MessageHandler: Send + 'static {
    /// Produce the reply for one request from `client_id`.
    fn handle(&mut self, client_id: &str, text: &str) -> String;
}

/// Replies `"Echo: <text>"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl MessageHandler for EchoHandler {
    fn handle(&mut self, _client_id: &str, text: &str) -> String {
        format!("Echo: {text}")
    }
}

/// Actions returned by the session state machine.
///
/// The driver (test harness or production server) executes these in order:
/// - `Send`: Frame and write the message to the peer
/// - `Close`: Graceful shutdown after a BYE exchange
/// - `Abort`: Fatal error; the preceding `Send` already carried the ERROR
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Send this message to the peer
    Send(Message),

    /// Close the connection cleanly
    Close,

    /// Close the connection because of this error
    Abort(SessionError),
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the client's AUTH
    AwaitingAuth,
    /// Handshake complete, exchanging DATA
    Authenticated,
    /// Connection finished (graceful or error)
    Closed,
}

/// Per-connection secrets established by a valid AUTH.
#[derive(Debug)]
struct Established {
    client_id: String,
    scheme: Scheme,
    keys: SessionKeySet,
    expected_counter: u64,
}

#[derive(Debug)]
enum Phase {
    AwaitingAuth,
    Authenticated(Established),
    Closed,
}

/// Server side of one client connection.
///
/// Owns its session keys for the lifetime of the connection. Nothing is
/// shared with other sessions except the read-only configuration and the
/// listener's [`ReplayGuard`].
#[derive(Debug)]
pub struct ServerSession<E: Environment, H: MessageHandler> {
    config: Arc<ServerConfig>,
    replay: ReplayGuard,
    env: E,
    handler: H,
    phase: Phase,
}

impl<E: Environment, H: MessageHandler> ServerSession<E, H> {
    /// Create a session in [`SessionState::AwaitingAuth`].
    ///
    /// Every session behind one listener must share the same `replay` guard,
    /// otherwise a captured AUTH is accepted once per guard.
    pub fn new(config: Arc<ServerConfig>, replay: ReplayGuard, env: E, handler: H) -> Self {
        Self { config, replay, env, handler, phase: Phase::AwaitingAuth }
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::AwaitingAuth => SessionState::AwaitingAuth,
            Phase::Authenticated(_) => SessionState::Authenticated,
            Phase::Closed => SessionState::Closed,
        }
    }

    /// Authenticated client id. `None` before the handshake and after close.
    pub fn client_id(&self) -> Option<&str> {
        match &self.phase {
            Phase::Authenticated(est) => Some(&est.client_id),
            Phase::AwaitingAuth | Phase::Closed => None,
        }
    }

    /// Counter the next DATA request must carry. `None` unless authenticated.
    pub fn expected_counter(&self) -> Option<u64> {
        match &self.phase {
            Phase::Authenticated(est) => Some(est.expected_counter),
            Phase::AwaitingAuth | Phase::Closed => None,
        }
    }

    /// Scheme pinned by the ticket. `None` unless authenticated.
    pub fn scheme(&self) -> Option<Scheme> {
        match &self.phase {
            Phase::Authenticated(est) => Some(est.scheme),
            Phase::AwaitingAuth | Phase::Closed => None,
        }
    }

    /// Mark the session closed and drop its keys.
    pub fn close(&mut self) {
        self.phase = Phase::Closed;
    }

    /// Process one incoming message.
    ///
    /// Fatal errors produce `[Send(ERROR), Abort(err)]` and close the
    /// session. A closed session ignores everything.
    pub fn handle_message(&mut self, message: Message) -> Vec<SessionAction> {
        match self.state() {
            SessionState::Closed => Vec::new(),
            SessionState::AwaitingAuth => match message {
                Message::Auth(auth) => match self.authenticate(&auth) {
                    Ok(reply) => vec![SessionAction::Send(reply)],
                    Err(err) => self.fail(err),
                },
                other => self.fail(SessionError::ProtocolViolation(format!(
                    "expected AUTH, got {}",
                    other.type_name()
                ))),
            },
            SessionState::Authenticated => match message {
                Message::Data(data) => match self.exchange(&data) {
                    Ok(reply) => vec![SessionAction::Send(reply)],
                    Err(err) => self.fail(err),
                },
                Message::Bye => {
                    tracing::info!(
                        client_id = self.client_id().unwrap_or_default(),
                        "client said BYE"
                    );
                    self.close();
                    vec![SessionAction::Send(Message::Bye), SessionAction::Close]
                },
                other => self.fail(SessionError::UnexpectedMessage {
                    message_type: other.type_name(),
                }),
            },
        }
    }

    /// Validate ticket and authenticator, then enter the authenticated state.
    fn authenticate(&mut self, auth: &Auth) -> Result<Message, SessionError> {
        let now = self.env.wall_clock_secs();

        let ticket: TicketBody =
            self.config.server_key.open(&auth.ticket).map_err(|err| match err {
                CryptoError::MalformedPayload(reason) => {
                    SessionError::ProtocolViolation(format!("undecodable ticket: {reason}"))
                },
                other => SessionError::from(AuthFailure::TicketRejected(other)),
            })?;

        if ticket.server_id != self.config.server_id {
            return Err(AuthFailure::WrongServer {
                expected: self.config.server_id.clone(),
                actual: ticket.server_id,
            }
            .into());
        }

        if ticket.is_expired_at(now) {
            return Err(AuthFailure::TicketExpired { expiry: ticket.expiry, now }.into());
        }

        let authenticator: Authenticator =
            keyward_crypto::open_payload_as(ticket.scheme, &ticket.keys, &auth.authenticator)
                .map_err(|err| match err {
                    CryptoError::SchemeMismatch { expected, actual } => SessionError::from(
                        AuthFailure::SchemeMismatch { pinned: expected, presented: actual },
                    ),
                    CryptoError::MalformedPayload(reason) => SessionError::ProtocolViolation(
                        format!("undecodable authenticator: {reason}"),
                    ),
                    other => SessionError::from(AuthFailure::AuthenticatorRejected(other)),
                })?;

        if authenticator.scheme != ticket.scheme {
            return Err(AuthFailure::SchemeMismatch {
                pinned: ticket.scheme,
                presented: authenticator.scheme,
            }
            .into());
        }

        if authenticator.client_id != ticket.client_id {
            return Err(AuthFailure::ClientMismatch {
                ticket: ticket.client_id,
                authenticator: authenticator.client_id,
            }
            .into());
        }

        let max_skew = self.config.max_clock_skew.as_secs();
        if !authenticator.is_fresh_at(now, max_skew) {
            return Err(AuthFailure::StaleAuthenticator {
                timestamp: authenticator.timestamp,
                now,
                max_skew,
            }
            .into());
        }

        if !self.replay.check_and_record(
            &authenticator.client_id,
            authenticator.timestamp,
            &auth.ticket,
            now,
            max_skew,
        ) {
            return Err(AuthFailure::ReplayedAuthenticator {
                client_id: authenticator.client_id,
                timestamp: authenticator.timestamp,
            }
            .into());
        }

        tracing::info!(
            client_id = %ticket.client_id,
            server_id = %self.config.server_id,
            scheme = %ticket.scheme,
            "handshake complete"
        );

        let message = format!("Handshake complete. scheme={}", ticket.scheme);
        self.phase = Phase::Authenticated(Established {
            client_id: ticket.client_id,
            scheme: ticket.scheme,
            keys: ticket.keys,
            expected_counter: 1,
        });

        Ok(Message::AuthOk(AuthOk { message }))
    }

    /// Open one DATA request, run the handler and seal the reply.
    fn exchange(&mut self, data: &Data) -> Result<Message, SessionError> {
        let Phase::Authenticated(est) = &mut self.phase else {
            unreachable!("exchange only runs in the authenticated state");
        };

        let request: AppPayload = keyward_crypto::open_payload_as(
            est.scheme,
            &est.keys,
            &data.envelope,
        )
        .map_err(|err| match err {
            CryptoError::SchemeMismatch { expected, actual } => SessionError::from(
                AuthFailure::SchemeMismatch { pinned: expected, presented: actual },
            ),
            CryptoError::MalformedPayload(reason) => {
                SessionError::ProtocolViolation(format!("undecodable DATA payload: {reason}"))
            },
            other => SessionError::from(AuthFailure::EnvelopeRejected(other)),
        })?;

        if request.counter != est.expected_counter {
            return Err(SessionError::SequenceViolation {
                expected: est.expected_counter,
                received: request.counter,
            });
        }

        tracing::debug!(client_id = %est.client_id, counter = request.counter, "DATA received");

        let reply_text = self.handler.handle(&est.client_id, &request.text);
        let reply = AppPayload::new(est.expected_counter + 1, reply_text);
        est.expected_counter += 2;

        let envelope = seal_payload(
            est.scheme,
            &est.keys,
            &reply,
            self.env.random_array::<SEAL_RANDOM_SIZE>(),
        )
        .map_err(|err| SessionError::Internal(err.to_string()))?;

        Ok(Message::Data(Data { envelope }))
    }

    /// Turn an error into wire actions, closing the session if it is fatal.
    fn fail(&mut self, err: SessionError) -> Vec<SessionAction> {
        let reply = SessionAction::Send(Message::Error(err.to_error_payload()));

        if !err.is_fatal() {
            tracing::debug!(kind = %err.kind(), error = %err, "ignored unexpected message");
            return vec![reply];
        }

        tracing::warn!(
            kind = %err.kind(),
            client_id = self.client_id().unwrap_or_default(),
            error = %err,
            "session rejected"
        );
        self.close();
        vec![reply, SessionAction::Abort(err)]
    }
}
