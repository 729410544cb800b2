//! Client side of the sequenced application channel.
//!
//! The channel is strictly half-duplex: one request, then its reply. The
//! local counter names the next request; a reply must carry `counter + 1`,
//! after which the counter moves on by two.

use keyward_core::Environment;
use keyward_crypto::{SEAL_RANDOM_SIZE, Scheme, SessionKeySet, open_payload_as, seal_payload};
use keyward_proto::{AppPayload, Data, Message};

use crate::{client::Credentials, error::ClientError};

/// Channel lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Ready to send the next request
    Idle,
    /// Request sent, waiting for its reply
    AwaitingReply,
    /// BYE sent, waiting for the echo
    Closing,
    /// Channel finished (graceful or error)
    Closed,
}

/// Authenticated, sequenced channel to one server.
#[derive(Debug)]
pub struct Channel<E: Environment> {
    env: E,
    server_id: String,
    scheme: Scheme,
    keys: SessionKeySet,
    greeting: String,
    counter: u64,
    state: ChannelState,
}

impl<E: Environment> Channel<E> {
    pub(crate) fn new(env: E, credentials: Credentials, greeting: String) -> Self {
        Self {
            env,
            server_id: credentials.server_id().to_string(),
            scheme: credentials.scheme(),
            keys: credentials.keys().clone(),
            greeting,
            counter: 1,
            state: ChannelState::Idle,
        }
    }

    /// Server this channel is bound to.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Scheme pinned for this session.
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Server's handshake greeting.
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Counter the next request will carry.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Current channel state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Seal `text` as the next request.
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidState` if a reply is outstanding or the channel
    ///   is closing
    /// - `ClientError::Crypto` if sealing fails
    pub fn seal_request(&mut self, text: &str) -> Result<Message, ClientError> {
        if self.state != ChannelState::Idle {
            return Err(ClientError::InvalidState(format!(
                "cannot send a request while {:?}",
                self.state
            )));
        }

        let envelope = seal_payload(
            self.scheme,
            &self.keys,
            &AppPayload::new(self.counter, text),
            self.env.random_array::<SEAL_RANDOM_SIZE>(),
        )
        .map_err(ClientError::Crypto)?;

        tracing::debug!(server_id = %self.server_id, counter = self.counter, "DATA sent");
        self.state = ChannelState::AwaitingReply;

        Ok(Message::Data(Data { envelope }))
    }

    /// Open the reply to the outstanding request.
    ///
    /// Any error leaves the channel closed. The server closes its side on
    /// every DATA failure, and a bad reply means the session cannot be
    /// trusted.
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidState` if no request is outstanding
    /// - `ClientError::Rejected` if the server answered with ERROR
    /// - `ClientError::Authentication` if the reply fails verification
    /// - `ClientError::SequenceViolation` if the counter is not `counter + 1`
    /// - `ClientError::UnexpectedMessage` for anything but DATA
    pub fn open_reply(&mut self, message: Message) -> Result<AppPayload, ClientError> {
        if self.state != ChannelState::AwaitingReply {
            return Err(ClientError::InvalidState("no request outstanding".to_string()));
        }

        let result = self.open_reply_inner(message);
        self.state = if result.is_ok() { ChannelState::Idle } else { ChannelState::Closed };
        result
    }

    fn open_reply_inner(&mut self, message: Message) -> Result<AppPayload, ClientError> {
        let data = match message {
            Message::Data(data) => data,
            Message::Error(payload) => {
                return Err(ClientError::Rejected { code: payload.code, error: payload.error });
            },
            other => {
                return Err(ClientError::UnexpectedMessage {
                    expected: "DATA",
                    actual: other.type_name(),
                });
            },
        };

        let reply: AppPayload = open_payload_as(self.scheme, &self.keys, &data.envelope)
            .map_err(ClientError::from_open)?;

        let expected = self.counter + 1;
        if reply.counter != expected {
            return Err(ClientError::SequenceViolation { expected, received: reply.counter });
        }

        tracing::debug!(server_id = %self.server_id, counter = reply.counter, "DATA received");
        self.counter += 2;

        Ok(reply)
    }

    /// Build a BYE and start closing.
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidState` unless the channel is idle
    pub fn bye(&mut self) -> Result<Message, ClientError> {
        if self.state != ChannelState::Idle {
            return Err(ClientError::InvalidState(format!(
                "cannot say BYE while {:?}",
                self.state
            )));
        }

        self.state = ChannelState::Closing;
        Ok(Message::Bye)
    }

    /// Consume the server's answer to BYE.
    ///
    /// # Errors
    ///
    /// - `ClientError::Rejected` if the server answered with ERROR
    /// - `ClientError::UnexpectedMessage` for anything but BYE
    pub fn accept_bye(&mut self, message: Message) -> Result<(), ClientError> {
        self.state = ChannelState::Closed;

        match message {
            Message::Bye => {
                tracing::info!(server_id = %self.server_id, "session closed");
                Ok(())
            },
            Message::Error(payload) => {
                Err(ClientError::Rejected { code: payload.code, error: payload.error })
            },
            other => {
                Err(ClientError::UnexpectedMessage { expected: "BYE", actual: other.type_name() })
            },
        }
    }
}
