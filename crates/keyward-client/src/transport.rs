//! Async driver over any byte stream.
//!
//! A thin layer that moves messages between the sans-IO [`Client`] /
//! [`Channel`] and a stream. There is no retry and no re-authentication: any
//! failure is returned to the caller, who decides whether to start over with
//! fresh credentials.

use keyward_core::{Environment, read_message, write_message};
use keyward_crypto::Scheme;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::{TcpStream, ToSocketAddrs},
};

use crate::{
    channel::Channel,
    client::{Client, Credentials},
    error::ClientError,
};

/// Run one KDC exchange over `stream`.
///
/// # Errors
///
/// - Any `ClientError` from [`Client::accept_key_response`]
/// - `ClientError::Transport` if the stream fails
pub async fn request_credentials<S, E>(
    stream: &mut S,
    client: &mut Client<E>,
    server_id: &str,
    scheme: Scheme,
    max_frame_len: usize,
) -> Result<Credentials, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    E: Environment,
{
    let request = client.key_request(server_id, scheme);
    write_message(stream, &request).await?;

    let reply = read_message(stream, max_frame_len).await?;
    client.accept_key_response(reply)
}

/// Authenticated connection to an application server.
#[derive(Debug)]
pub struct Connection<S, E: Environment> {
    stream: S,
    channel: Channel<E>,
    max_frame_len: usize,
}

impl<S, E> Connection<S, E>
where
    S: AsyncRead + AsyncWrite + Unpin,
    E: Environment,
{
    /// Perform the AUTH handshake over `stream`.
    ///
    /// # Errors
    ///
    /// - Any `ClientError` from [`Client::accept_auth_reply`]
    /// - `ClientError::Transport` if the stream fails
    pub async fn establish(
        mut stream: S,
        client: &Client<E>,
        credentials: Credentials,
        max_frame_len: usize,
    ) -> Result<Self, ClientError> {
        let (auth, pending) = client.authenticate(credentials)?;
        write_message(&mut stream, &auth).await?;

        let reply = read_message(&mut stream, max_frame_len).await?;
        let channel = client.accept_auth_reply(pending, reply)?;

        Ok(Self { stream, channel, max_frame_len })
    }

    /// The underlying channel state.
    pub fn channel(&self) -> &Channel<E> {
        &self.channel
    }

    /// Send one request and wait for its reply text.
    ///
    /// # Errors
    ///
    /// - Any `ClientError` from [`Channel::open_reply`]
    /// - `ClientError::Transport` if the stream fails
    pub async fn send(&mut self, text: &str) -> Result<String, ClientError> {
        let request = self.channel.seal_request(text)?;
        write_message(&mut self.stream, &request).await?;

        let reply = read_message(&mut self.stream, self.max_frame_len).await?;
        Ok(self.channel.open_reply(reply)?.text)
    }

    /// Exchange BYE and shut the stream down.
    ///
    /// # Errors
    ///
    /// - Any `ClientError` from [`Channel::bye`] or [`Channel::accept_bye`]
    /// - `ClientError::Transport` if the stream fails
    pub async fn close(mut self) -> Result<(), ClientError> {
        let bye = self.channel.bye()?;
        write_message(&mut self.stream, &bye).await?;

        let reply = read_message(&mut self.stream, self.max_frame_len).await?;
        self.channel.accept_bye(reply)?;

        // Peer may already have closed; nothing left to deliver either way
        let _ = self.stream.shutdown().await;
        Ok(())
    }
}

/// Connect to a KDC over TCP and fetch credentials for `server_id`.
///
/// # Errors
///
/// - `ClientError::Transport` if the connection fails
/// - Any error from [`request_credentials`]
pub async fn fetch_credentials_tcp<A, E>(
    kdc_addr: A,
    client: &mut Client<E>,
    server_id: &str,
    scheme: Scheme,
    max_frame_len: usize,
) -> Result<Credentials, ClientError>
where
    A: ToSocketAddrs,
    E: Environment,
{
    let mut stream =
        TcpStream::connect(kdc_addr).await.map_err(keyward_core::TransportError::from)?;
    request_credentials(&mut stream, client, server_id, scheme, max_frame_len).await
}

/// Connect to an application server over TCP and authenticate.
///
/// # Errors
///
/// - `ClientError::Transport` if the connection fails
/// - Any error from [`Connection::establish`]
pub async fn connect_tcp<A, E>(
    server_addr: A,
    client: &Client<E>,
    credentials: Credentials,
    max_frame_len: usize,
) -> Result<Connection<TcpStream, E>, ClientError>
where
    A: ToSocketAddrs,
    E: Environment,
{
    let stream =
        TcpStream::connect(server_addr).await.map_err(keyward_core::TransportError::from)?;
    Connection::establish(stream, client, credentials, max_frame_len).await
}
