//! Server connection handler
//!
//! Runs the per-connection state machine:
//! `Handshaking → Registered → Relaying → Closed`.
//!
//! The handshake and every chat line are a single unframed read of up to
//! [`READ_BUFFER_SIZE`] bytes. TCP may split or merge writes, so a fast
//! client can have two lines delivered as one message.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::connection::FrameSink;
use crate::error::{is_connection_lost, AppError};
use crate::message::{Frame, READ_BUFFER_SIZE};
use crate::registry::Registry;
use crate::types::{ConnectionId, DisplayName};

/// Handle a new TCP connection
///
/// Returns once the peer goes away. Cleanup always runs before an error is
/// returned, so the registry never keeps a dead member.
pub async fn handle_connection(stream: TcpStream, registry: Arc<Registry>) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    let (reader, writer) = stream.into_split();
    serve_member(reader, Box::new(writer), &registry, &peer_addr).await
}

/// Drive one member from handshake to cleanup over any byte stream
pub async fn serve_member<R>(
    mut reader: R,
    sink: FrameSink,
    registry: &Registry,
    peer: &str,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_BUFFER_SIZE];

    // Handshaking
    let n = match reader.read(&mut buf).await {
        Ok(0) => {
            debug!("{} closed before sending a name", peer);
            return Ok(());
        }
        Ok(n) => n,
        Err(e) if is_connection_lost(&e) => {
            debug!("{} dropped before sending a name: {}", peer, e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let requested = std::str::from_utf8(&buf[..n])?;

    // Registered
    let id = ConnectionId::new();
    let name = registry.register(requested, id, sink).await;
    info!("{} connected from {}", name, peer);

    registry
        .broadcast(Some(id), &Frame::Chat(format!("{} joined", name)))
        .await;
    registry.broadcast_member_count().await;

    let result = relay(&mut reader, &mut buf, registry, id, &name).await;

    // Closed
    registry.deregister(id).await;
    registry
        .broadcast(Some(id), &Frame::Chat(format!("{} disconnected", name)))
        .await;
    registry.broadcast_member_count().await;
    info!("{} ({}) disconnected", name, peer);

    result
}

/// Relaying: forward every line as `"<name>: <text>"` until the peer leaves
async fn relay<R>(
    reader: &mut R,
    buf: &mut [u8],
    registry: &Registry,
    id: ConnectionId,
    name: &DisplayName,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
{
    loop {
        let n = match reader.read(buf).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if is_connection_lost(&e) => {
                debug!("Connection of {} lost: {}", name, e);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let text = std::str::from_utf8(&buf[..n])?;
        debug!("Received from {}: {}", name, text);

        registry
            .broadcast(Some(id), &Frame::Chat(format!("{}: {}", name, text)))
            .await;
    }
}
