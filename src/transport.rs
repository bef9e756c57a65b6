//! Client transport
//!
//! Owns the socket, the name handshake and the background receive task.
//! States: `Disconnected → Connecting → Connected → (on fault) Reconnecting
//! → Connected | Disconnected`.
//!
//! The receive task only reads and callers only write, so the two never
//! contend for the same half of the socket. While reconnecting there is no
//! write half: sends fail and nothing is buffered for replay.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{is_connection_lost, ClientError, ProtocolError};
use crate::events::ChatEvents;
use crate::message::{read_frame, Frame};
use crate::retry::{pause, Immediate, RetryPolicy};

/// Client connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

type FrameReader = BufReader<OwnedReadHalf>;

/// State shared between the caller and the receive task
struct Shared<E> {
    addr: String,
    name: String,
    events: E,
    retry: Box<dyn RetryPolicy>,
    state: watch::Sender<ConnectionState>,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl<E: ChatEvents> Shared<E> {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Connection state {:?} -> {:?}", previous, state);
        }
    }

    /// Open a fresh socket and send the name handshake
    async fn open(&self) -> io::Result<(FrameReader, OwnedWriteHalf)> {
        let stream = TcpStream::connect(self.addr.as_str()).await?;
        let (reader, mut writer) = stream.into_split();
        writer.write_all(self.name.as_bytes()).await?;
        Ok((BufReader::new(reader), writer))
    }
}

/// Connection to a chat server
pub struct ChatClient<E: ChatEvents> {
    shared: Arc<Shared<E>>,
    /// Fired (or dropped) to stop the receive task
    shutdown: Option<oneshot::Sender<()>>,
    receiver: Option<JoinHandle<()>>,
}

impl<E: ChatEvents> ChatClient<E> {
    /// Create a disconnected client that retries immediately after faults
    pub fn new(addr: impl Into<String>, name: impl Into<String>, events: E) -> Self {
        Self::with_retry_policy(addr, name, events, Immediate)
    }

    /// Create a disconnected client with a custom reconnect policy
    pub fn with_retry_policy<P: RetryPolicy>(
        addr: impl Into<String>,
        name: impl Into<String>,
        events: E,
        retry: P,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                addr: addr.into(),
                name: name.into(),
                events,
                retry: Box::new(retry),
                state,
                writer: Mutex::new(None),
            }),
            shutdown: None,
            receiver: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn events(&self) -> &E {
        &self.shared.events
    }

    /// Try once to connect and start receiving
    ///
    /// Returns `Ok(false)` if the server refused the connection; the caller
    /// decides whether to try again. Other failures are errors.
    pub async fn try_connect(&mut self) -> Result<bool, ClientError> {
        if self.state() != ConnectionState::Disconnected {
            return Err(ClientError::AlreadyConnected);
        }

        self.shared.set_state(ConnectionState::Connecting);
        let (reader, writer) = match self.shared.open().await {
            Ok(halves) => halves,
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                debug!("Connection to {} refused", self.shared.addr);
                self.shared.set_state(ConnectionState::Disconnected);
                return Ok(false);
            }
            Err(e) => {
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(e.into());
            }
        };

        *self.shared.writer.lock().await = Some(writer);
        self.shared.set_state(ConnectionState::Connected);
        info!("Connected to {} as '{}'", self.shared.addr, self.shared.name);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown = Some(shutdown_tx);
        self.receiver = Some(tokio::spawn(receive_loop(
            reader,
            Arc::clone(&self.shared),
            shutdown_rx,
        )));

        Ok(true)
    }

    /// Write one raw chat line
    ///
    /// Fails with `NotConnected` while disconnected or reconnecting.
    pub async fn send(&self, text: &str) -> Result<(), ClientError> {
        let mut guard = self.shared.writer.lock().await;
        let writer = match guard.as_mut() {
            Some(writer) if self.state() == ConnectionState::Connected => writer,
            _ => return Err(ClientError::NotConnected),
        };
        writer.write_all(text.as_bytes()).await?;
        Ok(())
    }

    /// Close the connection and stop the receive task without reconnecting
    pub async fn disconnect(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(receiver) = self.receiver.take() {
            if let Err(e) = receiver.await {
                warn!("Receive task ended abnormally: {}", e);
            }
        }
        self.shared.writer.lock().await.take();
        self.shared.set_state(ConnectionState::Disconnected);
        info!("Disconnected from {}", self.shared.addr);
    }
}

/// Decode frames and dispatch them until a local abort
async fn receive_loop<E: ChatEvents>(
    mut reader: FrameReader,
    shared: Arc<Shared<E>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let result = tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!("Receive loop aborted locally");
                return;
            }
            result = read_frame(&mut reader) => result,
        };

        match result {
            Ok(Frame::MemberCount(count)) => shared.events.on_member_count_changed(count),
            Ok(Frame::Chat(text)) => shared.events.on_message(&text),
            Err(ProtocolError::UnknownTag(tag)) => {
                debug!("Skipping unknown frame tag {:#04x}", tag);
            }
            Err(ProtocolError::InvalidUtf8(e)) => {
                warn!("Skipping chat frame: {}", e);
            }
            Err(e) => {
                match &e {
                    ProtocolError::Io(io) if is_connection_lost(io) => {
                        info!("Connection to {} lost: {}", shared.addr, e)
                    }
                    _ => warn!("Receive from {} failed: {}", shared.addr, e),
                }
                match reconnect(&shared, reader, &mut shutdown).await {
                    Some(fresh) => reader = fresh,
                    None => return,
                }
            }
        }
    }
}

/// Replace the lost socket, retrying as the policy allows
///
/// Both halves of the stale socket are closed before the first attempt.
/// Returns the new read half, or `None` on local abort or when the policy
/// gives up.
async fn reconnect<E: ChatEvents>(
    shared: &Shared<E>,
    stale: FrameReader,
    shutdown: &mut oneshot::Receiver<()>,
) -> Option<FrameReader> {
    shared.set_state(ConnectionState::Reconnecting);
    shared.events.on_reconnect_status(false);
    drop(stale);
    shared.writer.lock().await.take();

    let mut failures: u32 = 0;
    loop {
        let opened = tokio::select! {
            biased;
            _ = &mut *shutdown => return None,
            opened = shared.open() => opened,
        };

        match opened {
            Ok((reader, writer)) => {
                *shared.writer.lock().await = Some(writer);
                shared.set_state(ConnectionState::Connected);
                info!(
                    "Reconnected to {} after {} failed attempts",
                    shared.addr, failures
                );
                shared.events.on_reconnect_status(true);
                return Some(reader);
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                if e.kind() == io::ErrorKind::ConnectionRefused {
                    debug!("Reconnect attempt {} refused", failures);
                } else {
                    warn!("Reconnect attempt {} failed: {}", failures, e);
                }

                let Some(delay) = shared.retry.next_delay(failures) else {
                    warn!("Giving up on {} after {} attempts", shared.addr, failures);
                    shared.set_state(ConnectionState::Disconnected);
                    return None;
                };
                tokio::select! {
                    biased;
                    _ = &mut *shutdown => return None,
                    _ = pause(delay) => {}
                }
            }
        }
    }
}
