//! Length-prefixed frames.
//!
//! A `Frame` is the transport-layer unit: a 4-byte big-endian body length
//! followed by the CBOR-encoded message body. The frame knows nothing about
//! message types. See `Message::into_frame()` and `Message::from_frame()` for
//! the typed view.

use bytes::{BufMut, Bytes};

use crate::errors::{ProtocolError, Result};

/// Default upper bound on a frame body (1 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Complete protocol frame.
///
/// Layout on the wire: `[length: u32 BE] + [body: length bytes]`
///
/// # Invariants
///
/// - Size Limit: decoding rejects any declared length above the caller's
///   `max_len` before the body is copied. A hostile peer cannot make the
///   receiver allocate more than `max_len` bytes per frame.
/// - Exactness: decoding consumes exactly `LENGTH_PREFIX_SIZE + length` bytes.
///   Trailing data is ignored, never folded into the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw body bytes (already CBOR-encoded)
    pub body: Bytes,
}

impl Frame {
    /// Wrap an encoded body.
    #[must_use]
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }

    /// Size of the frame on the wire, prefix included.
    pub fn wire_len(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.body.len()
    }

    /// Encode the frame into `dst`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooLarge` if the body length does not fit the
    ///   32-bit prefix
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let len = u32::try_from(self.body.len()).map_err(|_| ProtocolError::FrameTooLarge {
            size: self.body.len(),
            max: u32::MAX as usize,
        })?;

        dst.put_u32(len);
        dst.put_slice(&self.body);

        Ok(())
    }

    /// Validate a length prefix against `max_len`.
    ///
    /// Split out from [`Frame::decode`] so stream readers can check the
    /// declared length before reading the body.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooLarge` if the declared length exceeds
    ///   `max_len`
    pub fn parse_len(prefix: [u8; LENGTH_PREFIX_SIZE], max_len: usize) -> Result<usize> {
        let len = u32::from_be_bytes(prefix) as usize;
        if len > max_len {
            return Err(ProtocolError::FrameTooLarge { size: len, max: max_len });
        }
        Ok(len)
    }

    /// Decode a frame from the start of `bytes`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTruncated` if the prefix or body is incomplete
    /// - `ProtocolError::FrameTooLarge` if the declared length exceeds
    ///   `max_len`
    pub fn decode(bytes: &[u8], max_len: usize) -> Result<Self> {
        let Some((prefix, rest)) = bytes.split_first_chunk::<LENGTH_PREFIX_SIZE>() else {
            return Err(ProtocolError::FrameTruncated {
                expected: LENGTH_PREFIX_SIZE,
                actual: bytes.len(),
            });
        };

        let len = Self::parse_len(*prefix, max_len)?;

        let Some(body) = rest.get(..len) else {
            return Err(ProtocolError::FrameTruncated { expected: len, actual: rest.len() });
        };

        Ok(Self { body: Bytes::copy_from_slice(body) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_writes_big_endian_prefix() {
        let frame = Frame::new(vec![0xAA; 258]);
        let mut buf = Vec::new();
        frame.encode(&mut buf).unwrap();

        assert_eq!(&buf[..4], &[0x00, 0x00, 0x01, 0x02]);
        assert_eq!(buf.len(), frame.wire_len());
    }

    #[test]
    fn decode_round_trip() {
        let frame = Frame::new(b"hello".to_vec());
        let mut buf = Vec::new();
        frame.encode(&mut buf).unwrap();

        assert_eq!(Frame::decode(&buf, DEFAULT_MAX_FRAME_LEN).unwrap(), frame);
    }

    #[test]
    fn empty_body_is_valid() {
        let decoded = Frame::decode(&[0, 0, 0, 0], DEFAULT_MAX_FRAME_LEN).unwrap();
        assert!(decoded.body.is_empty());
    }

    #[test]
    fn oversized_declaration_rejected_before_body() {
        // Only the prefix is present: the limit check must not need the body
        let result = Frame::decode(&[0x00, 0x10, 0x00, 0x01], DEFAULT_MAX_FRAME_LEN);
        assert_eq!(
            result,
            Err(ProtocolError::FrameTooLarge { size: 0x0010_0001, max: DEFAULT_MAX_FRAME_LEN })
        );
    }

    #[test]
    fn length_at_limit_accepted() {
        assert_eq!(Frame::parse_len([0, 0, 0, 16], 16), Ok(16));
        assert!(Frame::parse_len([0, 0, 0, 17], 16).is_err());
    }

    #[test]
    fn truncated_prefix_rejected() {
        assert_eq!(
            Frame::decode(&[0, 0], DEFAULT_MAX_FRAME_LEN),
            Err(ProtocolError::FrameTruncated { expected: 4, actual: 2 })
        );
    }

    #[test]
    fn truncated_body_rejected() {
        assert_eq!(
            Frame::decode(&[0, 0, 0, 5, b'h', b'i'], DEFAULT_MAX_FRAME_LEN),
            Err(ProtocolError::FrameTruncated { expected: 5, actual: 2 })
        );
    }

    #[test]
    fn trailing_bytes_ignored() {
        let decoded =
            Frame::decode(&[0, 0, 0, 2, b'h', b'i', 0xFF], DEFAULT_MAX_FRAME_LEN).unwrap();
        assert_eq!(&decoded.body[..], b"hi");
    }
}
