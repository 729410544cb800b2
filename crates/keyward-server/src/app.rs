//! Application server listener.
//!
//! Executes the [`SessionAction`]s produced by [`ServerSession`] over a
//! stream. One task per connection; a session never outlives its
//! connection and shares nothing with other sessions except the immutable
//! [`ServerConfig`] and the listener's [`ReplayGuard`].

use std::{net::SocketAddr, sync::Arc};

use keyward_core::{
    Environment, MessageHandler, ReplayGuard, ServerConfig, ServerSession, SessionAction,
    SessionError, TransportError, read_message, write_message,
};
use keyward_proto::Message;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, ToSocketAddrs},
};

use crate::error::ServerError;

/// How a served connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Client said BYE and the echo was sent.
    Completed,
    /// Session ended on a fatal error. The ERROR has been sent when the
    /// stream still allowed it.
    Rejected(SessionError),
    /// Peer went away without BYE.
    PeerClosed,
}

/// Drive `session` over `stream` until it completes, fails or the peer
/// disconnects.
///
/// Frames that are oversized or do not decode are protocol violations: the
/// peer gets an ERROR and the session ends.
pub async fn serve_session<S, E, H>(
    mut stream: S,
    mut session: ServerSession<E, H>,
    max_frame_len: usize,
) -> SessionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
    E: Environment,
    H: MessageHandler,
{
    let outcome = loop {
        let message = match read_message(&mut stream, max_frame_len).await {
            Ok(message) => message,
            Err(TransportError::ConnectionClosed) => break SessionOutcome::PeerClosed,
            Err(err @ (TransportError::Malformed(_) | TransportError::FrameTooLarge { .. })) => {
                let err = SessionError::ProtocolViolation(err.to_string());
                tracing::warn!(kind = %err.kind(), error = %err, "session rejected frame");
                // Best effort: the peer is already misbehaving
                let _ = write_message(&mut stream, &Message::Error(err.to_error_payload())).await;
                break SessionOutcome::Rejected(err);
            },
            Err(err) => break SessionOutcome::Rejected(SessionError::Transport(err)),
        };

        if let Some(outcome) = execute_actions(&mut stream, session.handle_message(message)).await
        {
            break outcome;
        }
    };

    session.close();
    let _ = stream.shutdown().await;
    outcome
}

/// Execute session actions. Returns the outcome once the session has ended.
async fn execute_actions<S>(stream: &mut S, actions: Vec<SessionAction>) -> Option<SessionOutcome>
where
    S: AsyncWrite + Unpin,
{
    for action in actions {
        match action {
            SessionAction::Send(message) => {
                if let Err(err) = write_message(stream, &message).await {
                    return Some(match err {
                        TransportError::ConnectionClosed => SessionOutcome::PeerClosed,
                        other => SessionOutcome::Rejected(SessionError::Transport(other)),
                    });
                }
            },
            SessionAction::Close => return Some(SessionOutcome::Completed),
            SessionAction::Abort(err) => return Some(SessionOutcome::Rejected(err)),
        }
    }

    None
}

/// TCP listener for the application server.
#[derive(Debug)]
pub struct AppServer<E: Environment, H: MessageHandler + Clone> {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    replay: ReplayGuard,
    env: E,
    handler: H,
}

impl<E: Environment, H: MessageHandler + Clone> AppServer<E, H> {
    /// Bind the application server to `addr`.
    ///
    /// Each connection gets its own clone of `handler`.
    ///
    /// # Errors
    ///
    /// - `ServerError::Transport` if the address cannot be bound
    pub async fn bind(
        addr: impl ToSocketAddrs,
        config: ServerConfig,
        env: E,
        handler: H,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, config: Arc::new(config), replay: ReplayGuard::new(), env, handler })
    }

    /// Local address the server is bound to.
    ///
    /// # Errors
    ///
    /// - `ServerError::Transport` if the socket has no local address
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, one task per connection.
    ///
    /// Accept errors are logged and the loop continues.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(
            addr = %self.local_addr()?,
            server_id = %self.config.server_id,
            "application server listening"
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let session = ServerSession::new(
                        Arc::clone(&self.config),
                        self.replay.clone(),
                        self.env.clone(),
                        self.handler.clone(),
                    );
                    let max_frame_len = self.config.max_frame_len;

                    tokio::spawn(async move {
                        tracing::debug!(%peer, "connection accepted");
                        match serve_session(stream, session, max_frame_len).await {
                            SessionOutcome::Completed => {
                                tracing::debug!(%peer, "connection completed");
                            },
                            SessionOutcome::PeerClosed => {
                                tracing::debug!(%peer, "peer closed connection");
                            },
                            SessionOutcome::Rejected(err) => {
                                tracing::info!(
                                    %peer,
                                    kind = %err.kind(),
                                    error = %err,
                                    "connection rejected"
                                );
                            },
                        }
                    });
                },
                Err(e) => {
                    tracing::error!(error = %e, "accept error");
                },
            }
        }
    }
}
