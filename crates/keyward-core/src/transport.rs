//! Framed message I/O over any async byte stream.
//!
//! Thin glue between `tokio::io` and the frame codec. Both functions are
//! generic over the stream type, so the production TCP runtime, the
//! simulator and in-memory tests share them.

use keyward_proto::{Frame, LENGTH_PREFIX_SIZE, Message};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransportError;

/// Encode `message` and write it as one frame, then flush.
///
/// # Errors
///
/// - `TransportError::ConnectionClosed` if the peer has gone away
/// - `TransportError::Malformed` if the message cannot be encoded
/// - `TransportError::Io` for other write failures
pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut body = Vec::new();
    message.encode(&mut body)?;

    let frame = Frame::new(body);
    let mut buf = Vec::with_capacity(frame.wire_len());
    frame.encode(&mut buf)?;

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly one frame and decode it.
///
/// The declared length is checked against `max_len` before the body buffer
/// is allocated. A partial frame is never returned.
///
/// # Errors
///
/// - `TransportError::ConnectionClosed` if the stream ends before a full
///   frame arrives
/// - `TransportError::FrameTooLarge` if the declared length exceeds `max_len`
/// - `TransportError::Malformed` if the body is not a valid message
/// - `TransportError::Io` for other read failures
pub async fn read_message<R>(reader: &mut R, max_len: usize) -> Result<Message, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    reader.read_exact(&mut prefix).await?;

    let len = Frame::parse_len(prefix, max_len)?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    Message::decode(&body).map_err(|e| TransportError::Malformed(e.to_string()))
}
