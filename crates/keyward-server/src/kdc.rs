//! KDC listener.
//!
//! Each connection carries exactly one exchange: one `KEY_REQUEST` in, one
//! reply out, then the connection is closed. The [`Kdc`] is cloned into each
//! task; its configuration (and the master keys inside it) is shared
//! read-only.

use std::net::SocketAddr;

use keyward_core::{Environment, Kdc, KdcError, TransportError, read_message, write_message};
use keyward_proto::Message;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, ToSocketAddrs},
};

use crate::error::ServerError;

/// Serve one KDC exchange over `stream`.
///
/// A frame that is oversized or does not decode is answered with a
/// `PROTOCOL_VIOLATION` error before the connection is dropped.
///
/// # Errors
///
/// - `TransportError` if the request cannot be read or the reply cannot be
///   written
pub async fn serve_kdc_connection<S, E>(
    stream: &mut S,
    kdc: &Kdc<E>,
    max_frame_len: usize,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    E: Environment,
{
    let request = match read_message(stream, max_frame_len).await {
        Ok(request) => request,
        Err(err @ (TransportError::Malformed(_) | TransportError::FrameTooLarge { .. })) => {
            tracing::warn!(kind = "protocol_violation", error = %err, "KDC rejected frame");
            let payload = KdcError::ProtocolViolation(err.to_string()).to_error_payload();
            // Best effort: the peer is already misbehaving
            let _ = write_message(stream, &Message::Error(payload)).await;
            return Err(err);
        },
        Err(err) => return Err(err),
    };

    let reply = kdc.handle_request(&request);
    write_message(stream, &reply).await
}

/// TCP listener for the KDC.
#[derive(Debug)]
pub struct KdcServer<E: Environment> {
    listener: TcpListener,
    kdc: Kdc<E>,
}

impl<E: Environment> KdcServer<E> {
    /// Bind the KDC to `addr`.
    ///
    /// # Errors
    ///
    /// - `ServerError::Transport` if the address cannot be bound
    pub async fn bind(addr: impl ToSocketAddrs, kdc: Kdc<E>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, kdc })
    }

    /// Local address the KDC is bound to.
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
            server_id = %self.kdc.config().server_id,
            "KDC listening"
        );
        let max_frame_len = self.kdc.config().max_frame_len;

        loop {
            match self.listener.accept().await {
                Ok((mut stream, peer)) => {
                    let kdc = self.kdc.clone();

                    tokio::spawn(async move {
                        tracing::debug!(%peer, "KDC connection accepted");
                        if let Err(e) = serve_kdc_connection(&mut stream, &kdc, max_frame_len).await
                        {
                            tracing::debug!(%peer, error = %e, "KDC connection error");
                        }
                        let _ = stream.shutdown().await;
                    });
                },
                Err(e) => {
                    tracing::error!(error = %e, "KDC accept error");
                },
            }
        }
    }
}
