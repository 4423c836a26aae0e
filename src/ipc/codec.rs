//! i3-ipc framing
//!
//! ```text
//! "i3-ipc" | u32 payload length | u32 message type | payload
//! ```
//!
//! Integers are in native byte order, since the socket never leaves the
//! host.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAGIC: &[u8; 6] = b"i3-ipc";
pub const HEADER_LEN: usize = MAGIC.len() + 8;

/// Message type of a sync request and of its reply
pub const SYNC: u32 = 11;

/// Set on message types that are events rather than replies
pub const EVENT_BIT: u32 = 1 << 31;

/// Largest payload accepted from the peer
pub const MAX_PAYLOAD: u32 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("bad magic {0:?}")]
    BadMagic([u8; 6]),
    #[error("payload of {0} bytes exceeds limit")]
    TooLarge(u32),
}

/// One decoded message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub message_type: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn is_event(&self) -> bool {
        self.message_type & EVENT_BIT != 0
    }
}

/// Serialize a message into a single buffer
pub fn encode(message_type: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&(payload.len() as u32).to_ne_bytes());
    buf.extend_from_slice(&message_type.to_ne_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Parse a header into `(payload length, message type)`
pub fn decode_header(header: &[u8; HEADER_LEN]) -> Result<(u32, u32), FrameError> {
    let mut magic = [0u8; 6];
    magic.copy_from_slice(&header[..6]);
    if &magic != MAGIC {
        return Err(FrameError::BadMagic(magic));
    }

    let len = u32::from_ne_bytes([header[6], header[7], header[8], header[9]]);
    let message_type = u32::from_ne_bytes([header[10], header[11], header[12], header[13]]);
    if len > MAX_PAYLOAD {
        return Err(FrameError::TooLarge(len));
    }
    Ok((len, message_type))
}

pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, FrameError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let (len, message_type) = decode_header(&header)?;

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Frame {
        message_type,
        payload,
    })
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message_type: u32,
    payload: &[u8],
) -> io::Result<()> {
    writer.write_all(&encode(message_type, payload)).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let buf = encode(SYNC, b"{}");
        assert_eq!(&buf[..6], b"i3-ipc");
        assert_eq!(buf.len(), HEADER_LEN + 2);
        assert_eq!(u32::from_ne_bytes(buf[6..10].try_into().unwrap()), 2);
        assert_eq!(u32::from_ne_bytes(buf[10..14].try_into().unwrap()), SYNC);
        assert_eq!(&buf[14..], b"{}");
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut header = [0u8; HEADER_LEN];
        header[..6].copy_from_slice(b"i4-ipc");
        assert!(matches!(
            decode_header(&header),
            Err(FrameError::BadMagic(m)) if &m == b"i4-ipc"
        ));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let buf = encode(SYNC, b"");
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&buf[..HEADER_LEN]);
        header[6..10].copy_from_slice(&(MAX_PAYLOAD + 1).to_ne_bytes());
        assert!(matches!(decode_header(&header), Err(FrameError::TooLarge(_))));
    }

    #[tokio::test]
    async fn test_read_frame_from_stream() {
        let mut bytes = encode(SYNC, br#"{"success":true}"#);
        bytes.extend_from_slice(&encode(EVENT_BIT | 2, b"[]"));
        let mut reader = &bytes[..];

        let first = read_frame(&mut reader).await.unwrap();
        assert_eq!(first.message_type, SYNC);
        assert!(!first.is_event());

        let second = read_frame(&mut reader).await.unwrap();
        assert!(second.is_event());
        assert_eq!(second.payload, b"[]");
    }

    #[tokio::test]
    async fn test_truncated_frame_is_io_error() {
        let bytes = encode(SYNC, b"{\"success\":true}");
        let mut reader = &bytes[..bytes.len() - 3];
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(FrameError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof
        ));
    }
}
