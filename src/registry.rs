//! Member registry and broadcaster
//!
//! The only shared mutable state on the server. Names and connection handles
//! live together behind one mutex so every operation updates both at once.
//!
//! Broadcasts write to each socket while the lock is held: a slow peer stalls
//! delivery to everyone behind it, and concurrent registrations wait for it.

use std::collections::HashSet;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::connection::{Connection, FrameSink};
use crate::message::Frame;
use crate::types::{ConnectionId, DisplayName};

/// Names and handles, always modified together
#[derive(Debug, Default)]
struct Members {
    /// Resolved names currently in use
    names: HashSet<DisplayName>,
    /// Handles in join order
    connections: Vec<Connection>,
}

impl Members {
    /// Smallest `k` whose candidate name is free
    fn resolve_name(&self, requested: &str) -> DisplayName {
        let mut k = 1;
        loop {
            let candidate = DisplayName::candidate(requested, k);
            if !self.names.contains(&candidate) {
                return candidate;
            }
            k += 1;
        }
    }

    /// Write encoded bytes to every connection except `exclude`
    async fn deliver(&mut self, exclude: Option<ConnectionId>, bytes: &[u8]) {
        for conn in self.connections.iter_mut() {
            if Some(conn.id) == exclude {
                continue;
            }
            if let Err(e) = conn.send(bytes).await {
                debug!("Send to '{}' failed: {}", conn.name, e);
            }
        }
    }
}

/// Thread-safe set of active members
#[derive(Debug, Default)]
pub struct Registry {
    members: Mutex<Members>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new member and return its resolved name
    ///
    /// Name resolution and insertion happen under one lock, so two
    /// concurrent registrations can never resolve to the same name.
    pub async fn register(
        &self,
        requested: &str,
        id: ConnectionId,
        sink: FrameSink,
    ) -> DisplayName {
        let mut members = self.members.lock().await;
        let name = members.resolve_name(requested);
        members.names.insert(name.clone());
        members
            .connections
            .push(Connection::new(id, name.clone(), sink));
        debug!(
            "Registered {} as '{}', total members: {}",
            id,
            name,
            members.connections.len()
        );
        name
    }

    /// Remove a member and its name
    ///
    /// Returns the removed name, or `None` if the member was already gone.
    pub async fn deregister(&self, id: ConnectionId) -> Option<DisplayName> {
        let mut members = self.members.lock().await;
        let index = members.connections.iter().position(|c| c.id == id)?;
        let conn = members.connections.remove(index);
        members.names.remove(&conn.name);
        debug!(
            "Deregistered {} ('{}'), total members: {}",
            id,
            conn.name,
            members.connections.len()
        );
        Some(conn.name)
    }

    /// Send a frame to every member except `exclude`
    ///
    /// A failed write is logged and skipped; the failing member's own
    /// handler discovers the loss and cleans up.
    pub async fn broadcast(&self, exclude: Option<ConnectionId>, frame: &Frame) {
        let bytes = match frame.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Dropping broadcast: {}", e);
                return;
            }
        };

        let mut members = self.members.lock().await;
        members.deliver(exclude, &bytes).await;
    }

    /// Send the current member count to every member, sender included
    ///
    /// Counts above 255 saturate.
    pub async fn broadcast_member_count(&self) {
        let mut members = self.members.lock().await;
        let count = u8::try_from(members.connections.len()).unwrap_or(u8::MAX);
        match Frame::MemberCount(count).encode() {
            Ok(bytes) => members.deliver(None, &bytes).await,
            Err(e) => warn!("Dropping member count: {}", e),
        }
    }

    /// Number of registered members
    pub async fn len(&self) -> usize {
        self.members.lock().await.connections.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Resolved names in join order
    pub async fn names(&self) -> Vec<DisplayName> {
        let members = self.members.lock().await;
        members.connections.iter().map(|c| c.name.clone()).collect()
    }

    /// Whether the name set and handle list correspond one-to-one
    pub async fn is_consistent(&self) -> bool {
        let members = self.members.lock().await;
        members.names.len() == members.connections.len()
            && members
                .connections
                .iter()
                .all(|c| members.names.contains(&c.name))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::DuplexStream;
    use tokio::time::timeout;

    use super::*;
    use crate::message::read_frame;

    async fn join(registry: &Registry, name: &str) -> (ConnectionId, DisplayName, DuplexStream) {
        let (local, remote) = tokio::io::duplex(4096);
        let id = ConnectionId::new();
        let resolved = registry.register(name, id, Box::new(local)).await;
        (id, resolved, remote)
    }

    async fn next_frame(stream: &mut DuplexStream) -> Frame {
        timeout(Duration::from_secs(1), read_frame(stream))
            .await
            .expect("timed out waiting for frame")
            .expect("failed to read frame")
    }

    #[tokio::test]
    async fn test_duplicate_names_get_suffixes() {
        let registry = Registry::new();
        let mut resolved = Vec::new();
        for _ in 0..4 {
            let (_, name, _remote) = join(&registry, "Alice").await;
            resolved.push(name.0);
        }

        assert_eq!(resolved, vec!["Alice", "Alice(2)", "Alice(3)", "Alice(4)"]);
    }

    #[tokio::test]
    async fn test_freed_suffix_is_reused() {
        let registry = Registry::new();
        let (_a, _, _ra) = join(&registry, "Alice").await;
        let (b, second, _rb) = join(&registry, "Alice").await;
        let (_c, _, _rc) = join(&registry, "Alice").await;
        assert_eq!(second.as_str(), "Alice(2)");

        registry.deregister(b).await;
        let (_, reused, _rd) = join(&registry, "Alice").await;

        assert_eq!(reused.as_str(), "Alice(2)");
    }

    #[tokio::test]
    async fn test_concurrent_registration_unique() {
        let registry = Arc::new(Registry::new());
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let (local, remote) = tokio::io::duplex(64);
                let name = registry
                    .register("Bob", ConnectionId::new(), Box::new(local))
                    .await;
                (name, remote)
            }));
        }

        let mut names = HashSet::new();
        let mut remotes = Vec::new();
        for task in tasks {
            let (name, remote) = task.await.unwrap();
            names.insert(name);
            remotes.push(remote);
        }

        assert_eq!(names.len(), 16);
        assert!(registry.is_consistent().await);
    }

    #[tokio::test]
    async fn test_deregister_is_idempotent() {
        let registry = Registry::new();
        let (id, name, _remote) = join(&registry, "Carol").await;

        assert_eq!(registry.deregister(id).await, Some(name));
        assert_eq!(registry.deregister(id).await, None);
        assert!(registry.is_empty().await);
        assert!(registry.is_consistent().await);
    }

    #[tokio::test]
    async fn test_consistency_after_mixed_operations() {
        let registry = Registry::new();
        let mut ids = Vec::new();
        let mut remotes = Vec::new();
        for name in ["a", "b", "a", "c", "b"] {
            let (id, _, remote) = join(&registry, name).await;
            ids.push(id);
            remotes.push(remote);
        }
        registry.deregister(ids[1]).await;
        registry.deregister(ids[3]).await;
        registry.deregister(ids[3]).await;

        assert_eq!(registry.len().await, 3);
        assert!(registry.is_consistent().await);
        let names: Vec<String> = registry.names().await.into_iter().map(|n| n.0).collect();
        assert_eq!(names, vec!["a", "a(2)", "b(2)"]);
    }

    #[tokio::test]
    async fn test_broadcast_excludes_author() {
        let registry = Registry::new();
        let (alice, _, mut alice_rx) = join(&registry, "Alice").await;
        let (_, _, mut bob_rx) = join(&registry, "Bob").await;
        let (_, _, mut carol_rx) = join(&registry, "Carol").await;

        let chat = Frame::Chat("Alice: hi".to_string());
        registry.broadcast(Some(alice), &chat).await;
        registry.broadcast_member_count().await;

        assert_eq!(next_frame(&mut bob_rx).await, chat);
        assert_eq!(next_frame(&mut carol_rx).await, chat);
        // The author's first frame is the count, so the chat never reached her
        assert_eq!(next_frame(&mut alice_rx).await, Frame::MemberCount(3));
    }

    #[tokio::test]
    async fn test_member_count_reaches_everyone() {
        let registry = Registry::new();
        let (_, _, mut first) = join(&registry, "first").await;
        let (_, _, mut newest) = join(&registry, "newest").await;

        registry.broadcast_member_count().await;

        assert_eq!(next_frame(&mut first).await, Frame::MemberCount(2));
        assert_eq!(next_frame(&mut newest).await, Frame::MemberCount(2));
    }

    #[tokio::test]
    async fn test_failed_send_does_not_stop_broadcast() {
        let registry = Registry::new();
        let (_, _, gone) = join(&registry, "gone").await;
        let (_, _, mut alive) = join(&registry, "alive").await;
        drop(gone);

        let chat = Frame::Chat("still here".to_string());
        registry.broadcast(None, &chat).await;

        assert_eq!(next_frame(&mut alive).await, chat);
        assert_eq!(registry.len().await, 2);
    }
}
