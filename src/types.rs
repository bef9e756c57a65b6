//! Basic type definitions for the chat relay
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: UUID-based unique connection identifier
//! - `DisplayName`: a member's resolved, registry-unique name

use uuid::Uuid;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4. Never reused, even when a client reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display name as resolved by the registry
///
/// Either the requested name as-is or the requested name with a `(k)` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName(pub String);

impl DisplayName {
    /// Candidate name for the `k`-th member requesting `base`
    ///
    /// `k = 1` is the bare name; `k >= 2` appends `(k)`.
    pub fn candidate(base: &str, k: u32) -> Self {
        if k <= 1 {
            Self(base.to_string())
        } else {
            Self(format!("{}({})", base, k))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DisplayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
