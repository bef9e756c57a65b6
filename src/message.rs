//! Wire protocol definitions
//!
//! Server → client traffic is a stream of tagged binary frames:
//!
//! | Tag   | Payload                                         |
//! |-------|-------------------------------------------------|
//! | `'c'` | 1 byte: current member count                    |
//! | `'m'` | 2 bytes big-endian length `L`, then `L` bytes UTF-8 |
//!
//! Client → server traffic is unframed: the name handshake and every chat
//! line are raw UTF-8, one read of at most [`READ_BUFFER_SIZE`] bytes each.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

/// Tag byte of a member count frame
pub const MEMBER_COUNT_TAG: u8 = b'c';

/// Tag byte of a chat message frame
pub const CHAT_TAG: u8 = b'm';

/// Size of the single read used for the handshake and each chat line
pub const READ_BUFFER_SIZE: usize = 1024;

/// Longest chat text a frame can carry
pub const MAX_CHAT_LEN: usize = u16::MAX as usize;

/// Server → Client frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Number of members currently registered
    MemberCount(u8),
    /// Chat text, join notice or departure notice
    Chat(String),
}

impl Frame {
    /// Serialize the frame into its wire bytes
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Frame::MemberCount(count) => Ok(vec![MEMBER_COUNT_TAG, *count]),
            Frame::Chat(text) => {
                let len = u16::try_from(text.len()).map_err(|_| ProtocolError::MessageTooLong {
                    len: text.len(),
                    max: MAX_CHAT_LEN,
                })?;
                let mut buf = Vec::with_capacity(3 + text.len());
                buf.push(CHAT_TAG);
                buf.extend_from_slice(&len.to_be_bytes());
                buf.extend_from_slice(text.as_bytes());
                Ok(buf)
            }
        }
    }
}

/// Read exactly one frame
///
/// Blocks until the declared bytes have arrived. An unrecognized tag is
/// reported as [`ProtocolError::UnknownTag`] after consuming only the tag byte.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let tag = reader.read_u8().await?;
    match tag {
        MEMBER_COUNT_TAG => Ok(Frame::MemberCount(reader.read_u8().await?)),
        CHAT_TAG => {
            let len = reader.read_u16().await? as usize;
            let mut payload = vec![0u8; len];
            reader.read_exact(&mut payload).await?;
            Ok(Frame::Chat(String::from_utf8(payload)?))
        }
        other => Err(ProtocolError::UnknownTag(other)),
    }
}

/// Encode and write one frame, flushing afterwards
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = frame.encode()?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
