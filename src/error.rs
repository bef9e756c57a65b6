//! Error types for the chat relay
//!
//! Protocol (codec) errors, server handler errors and client errors.
//! Uses thiserror for ergonomic error definitions.

use std::io;

use thiserror::Error;

/// Wire protocol errors
///
/// `UnknownTag` is not fatal: the receiver skips the byte and keeps reading.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// IO error while reading or writing a frame
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Tag byte that is neither a member count nor a chat message
    #[error("Unknown frame tag: {0:#04x}")]
    UnknownTag(u8),

    /// Chat payload was not valid UTF-8
    #[error("Invalid UTF-8 payload: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Chat text does not fit the 16-bit length prefix
    #[error("Message too long: {len} bytes (max {max})")]
    MessageTooLong { len: usize, max: usize },
}

/// Server-side connection handler errors
///
/// Returned from the handler after cleanup already ran; the accept loop logs them.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error other than a lost connection
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Name or chat line was not valid UTF-8
    #[error("Invalid UTF-8 from peer: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Client-side errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// IO error other than a refused connection
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// `try_connect` called while a connection is already up
    #[error("Already connected")]
    AlreadyConnected,

    /// `send` called while disconnected or reconnecting
    #[error("Not connected")]
    NotConnected,

    /// Speaking gate is closed (fewer than two members)
    #[error("Too few members")]
    TooFewMembers,
}

/// Whether an IO error means the peer went away
///
/// An orderly close surfaces as `UnexpectedEof` from exact reads and is
/// treated the same as a reset.
pub fn is_connection_lost(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}
