//! Sans-IO client: credential intake and handshake.
//!
//! The client never touches a socket. Each method either builds the next
//! message to send or consumes the message that came back, so the same
//! logic runs over TCP, turmoil or a plain `Vec` in tests.
//!
//! # Flow
//!
//! ```text
//! key_request ──> KDC ──> accept_key_response ──> Credentials
//! authenticate(Credentials) ──> (AUTH, PendingHandshake)
//! AUTH ──> Server ──> accept_auth_reply(PendingHandshake) ──> Channel
//! ```
//!
//! `Credentials` are not `Clone` and `authenticate` takes them by value, so
//! one set backs exactly one connection attempt.

use keyward_core::{Authenticator, CredentialPackage, Environment};
use keyward_crypto::{Envelope, MasterKey, SEAL_RANDOM_SIZE, Scheme, SessionKeySet, seal_payload};
use keyward_proto::{Auth, KeyRequest, Message};

use crate::{channel::Channel, error::ClientError};

/// Long-term client identity.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    /// Identity presented to the KDC and server
    pub client_id: String,
    /// Key shared with the KDC
    pub master_key: MasterKey,
}

impl ClientIdentity {
    /// Create an identity whose master key is derived from `passphrase`.
    pub fn from_passphrase(client_id: impl Into<String>, passphrase: &str) -> Self {
        Self { client_id: client_id.into(), master_key: MasterKey::from_passphrase(passphrase) }
    }
}

/// Credentials obtained from the KDC for one server.
///
/// Single use: [`Client::authenticate`] consumes them, and the session keys
/// are zeroized when they are dropped.
#[derive(Debug, PartialEq, Eq)]
pub struct Credentials {
    server_id: String,
    package: CredentialPackage,
}

impl Credentials {
    /// Server these credentials are valid for.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Scheme pinned in the ticket.
    pub fn scheme(&self) -> Scheme {
        self.package.scheme
    }

    /// Issue time (Unix seconds, KDC clock).
    pub fn issued_at(&self) -> u64 {
        self.package.issued_at
    }

    /// Expiry (Unix seconds, KDC clock).
    pub fn expiry(&self) -> u64 {
        self.package.expiry
    }

    pub(crate) fn keys(&self) -> &SessionKeySet {
        &self.package.keys
    }

    pub(crate) fn ticket(&self) -> &Envelope {
        &self.package.ticket
    }
}

/// AUTH sent, waiting for the server's reply.
///
/// Holds the credentials the AUTH was built from until the handshake
/// finishes or fails.
#[derive(Debug)]
pub struct PendingHandshake {
    credentials: Credentials,
}

impl PendingHandshake {
    /// Server the AUTH was sent to.
    pub fn server_id(&self) -> &str {
        self.credentials.server_id()
    }

    /// Scheme pinned in the ticket.
    pub fn scheme(&self) -> Scheme {
        self.credentials.scheme()
    }
}

/// Outstanding KDC request.
#[derive(Debug, Clone)]
struct PendingRequest {
    server_id: String,
    scheme: Scheme,
}

/// Client state machine.
#[derive(Debug)]
pub struct Client<E: Environment> {
    env: E,
    identity: ClientIdentity,
    pending: Option<PendingRequest>,
}

impl<E: Environment> Client<E> {
    /// Create a client.
    pub fn new(env: E, identity: ClientIdentity) -> Self {
        Self { env, identity, pending: None }
    }

    /// Our client id.
    pub fn client_id(&self) -> &str {
        &self.identity.client_id
    }

    /// Build a `KEY_REQUEST` and remember what was asked for.
    pub fn key_request(&mut self, server_id: &str, scheme: Scheme) -> Message {
        self.pending = Some(PendingRequest { server_id: server_id.to_string(), scheme });

        Message::KeyRequest(KeyRequest {
            client_id: self.identity.client_id.clone(),
            server_id: server_id.to_string(),
            scheme: scheme.name().to_string(),
        })
    }

    /// Consume the KDC's reply.
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidState` if no request is outstanding
    /// - `ClientError::Rejected` if the KDC answered with ERROR
    /// - `ClientError::Authentication` if the package does not open under our
    ///   master key, or pins a scheme other than the one requested
    /// - `ClientError::CredentialsExpired` if the package is already expired
    /// - `ClientError::UnexpectedMessage` for any other reply
    pub fn accept_key_response(&mut self, message: Message) -> Result<Credentials, ClientError> {
        let Some(pending) = self.pending.take() else {
            return Err(ClientError::InvalidState("no key request outstanding".to_string()));
        };

        let response = match message {
            Message::KeyResponse(response) => response,
            Message::Error(payload) => {
                return Err(ClientError::Rejected { code: payload.code, error: payload.error });
            },
            other => {
                return Err(ClientError::UnexpectedMessage {
                    expected: "KEY_RESPONSE",
                    actual: other.type_name(),
                });
            },
        };

        let package: CredentialPackage = self
            .identity
            .master_key
            .open(&response.encrypted_client_package)
            .map_err(ClientError::from_open)?;

        if package.scheme != pending.scheme {
            return Err(ClientError::Authentication(keyward_crypto::CryptoError::SchemeMismatch {
                expected: pending.scheme,
                actual: package.scheme,
            }));
        }

        let now = self.env.wall_clock_secs();
        if now > package.expiry {
            return Err(ClientError::CredentialsExpired { expiry: package.expiry, now });
        }

        tracing::debug!(
            client_id = %self.identity.client_id,
            server_id = %pending.server_id,
            scheme = %package.scheme,
            expiry = package.expiry,
            "received credentials"
        );

        Ok(Credentials { server_id: pending.server_id, package })
    }

    /// Build an `AUTH` message with a fresh authenticator.
    ///
    /// Consumes `credentials`. The returned [`PendingHandshake`] is the only
    /// way to finish the handshake.
    ///
    /// # Errors
    ///
    /// - `ClientError::Crypto` if sealing the authenticator fails
    pub fn authenticate(
        &self,
        credentials: Credentials,
    ) -> Result<(Message, PendingHandshake), ClientError> {
        let authenticator = Authenticator {
            client_id: self.identity.client_id.clone(),
            timestamp: self.env.wall_clock_secs(),
            scheme: credentials.scheme(),
        };

        let sealed = seal_payload(
            credentials.scheme(),
            credentials.keys(),
            &authenticator,
            self.env.random_array::<SEAL_RANDOM_SIZE>(),
        )
        .map_err(ClientError::Crypto)?;

        let ticket = credentials.ticket().clone();
        let auth = Message::Auth(Auth { ticket, authenticator: sealed });
        Ok((auth, PendingHandshake { credentials }))
    }

    /// Consume the server's handshake reply.
    ///
    /// # Errors
    ///
    /// - `ClientError::Rejected` if the server answered with ERROR
    /// - `ClientError::UnexpectedMessage` for anything but OK
    pub fn accept_auth_reply(
        &self,
        pending: PendingHandshake,
        message: Message,
    ) -> Result<Channel<E>, ClientError> {
        let PendingHandshake { credentials } = pending;

        match message {
            Message::AuthOk(ok) => {
                tracing::info!(
                    client_id = %self.identity.client_id,
                    server_id = %credentials.server_id,
                    scheme = %credentials.scheme(),
                    greeting = %ok.message,
                    "handshake complete"
                );
                Ok(Channel::new(self.env.clone(), credentials, ok.message))
            },
            Message::Error(payload) => {
                Err(ClientError::Rejected { code: payload.code, error: payload.error })
            },
            other => {
                Err(ClientError::UnexpectedMessage { expected: "OK", actual: other.type_name() })
            },
        }
    }
}
