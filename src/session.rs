//! Client session driver
//!
//! Wraps the transport with the local speaking gate: sending is refused while
//! fewer than two members are present. The server does not enforce this.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::error::ClientError;
use crate::events::ChatEvents;
use crate::retry::RetryPolicy;
use crate::transport::{ChatClient, ConnectionState};

/// Members needed before anyone may speak
pub const MIN_MEMBERS_TO_SPEAK: u8 = 2;

/// "May I currently speak" flag
///
/// Written only by the receive task, read only by the sending side.
#[derive(Debug, Default)]
pub struct SpeakingGate {
    open: AtomicBool,
}

impl SpeakingGate {
    /// A closed gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute from the latest member count; returns the new value
    pub fn update(&self, member_count: u8) -> bool {
        let open = member_count >= MIN_MEMBERS_TO_SPEAK;
        self.open.store(open, Ordering::Release);
        open
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Updates the gate before forwarding each count to the caller's hooks
struct GatedEvents<E> {
    gate: Arc<SpeakingGate>,
    inner: E,
}

impl<E: ChatEvents> ChatEvents for GatedEvents<E> {
    fn on_message(&self, text: &str) {
        self.inner.on_message(text)
    }

    fn on_member_count_changed(&self, count: u8) {
        let open = self.gate.update(count);
        debug!("Member count {}, speaking gate open: {}", count, open);
        self.inner.on_member_count_changed(count)
    }

    fn on_reconnect_status(&self, success: bool) {
        self.inner.on_reconnect_status(success)
    }
}

/// Outward-facing chat operations: connect, send, disconnect
pub struct ChatSession<E: ChatEvents> {
    client: ChatClient<GatedEvents<E>>,
    gate: Arc<SpeakingGate>,
}

impl<E: ChatEvents> ChatSession<E> {
    pub fn new(addr: impl Into<String>, name: impl Into<String>, events: E) -> Self {
        let gate = Arc::new(SpeakingGate::new());
        let events = GatedEvents {
            gate: Arc::clone(&gate),
            inner: events,
        };
        Self {
            client: ChatClient::new(addr, name, events),
            gate,
        }
    }

    pub fn with_retry_policy<P: RetryPolicy>(
        addr: impl Into<String>,
        name: impl Into<String>,
        events: E,
        retry: P,
    ) -> Self {
        let gate = Arc::new(SpeakingGate::new());
        let events = GatedEvents {
            gate: Arc::clone(&gate),
            inner: events,
        };
        Self {
            client: ChatClient::with_retry_policy(addr, name, events, retry),
            gate,
        }
    }

    /// Try once to connect; `Ok(false)` means refused
    pub async fn try_connect(&mut self) -> Result<bool, ClientError> {
        self.client.try_connect().await
    }

    /// Send a chat line if the speaking gate is open
    ///
    /// A closed gate returns `TooFewMembers` without touching the socket.
    pub async fn send(&self, text: &str) -> Result<(), ClientError> {
        if !self.gate.is_open() {
            return Err(ClientError::TooFewMembers);
        }
        self.client.send(text).await
    }

    pub async fn disconnect(&mut self) {
        self.client.disconnect().await
    }

    pub fn can_speak(&self) -> bool {
        self.gate.is_open()
    }

    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.client.subscribe_state()
    }

    /// The caller's render hooks
    pub fn events(&self) -> &E {
        &self.client.events().inner
    }
}
