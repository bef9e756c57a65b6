//! Connection handle definition
//!
//! The server's per-connection object: identifier, resolved name and the
//! write side of the socket.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::types::{ConnectionId, DisplayName};

/// Write side of a member's socket
///
/// Boxed so the registry can hold TCP write halves in production and
/// in-memory duplex streams in tests.
pub type FrameSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Registered member connection
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Name resolved at registration
    pub name: DisplayName,
    sink: FrameSink,
}

impl Connection {
    /// Create a new connection handle
    pub fn new(id: ConnectionId, name: DisplayName, sink: FrameSink) -> Self {
        Self { id, name, sink }
    }

    /// Write already-encoded frame bytes to this member
    ///
    /// Blocks until the whole buffer is written; no timeout.
    pub async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.sink.write_all(bytes).await?;
        self.sink.flush().await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
