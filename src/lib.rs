//! Multi-user TCP Chat Relay Library
//!
//! A minimal chat service: a server that assigns unique display names and
//! relays text lines to every other member, and a client that renders
//! broadcasts and reconnects on its own when the connection drops.
//!
//! # Features
//! - Unique display names (`Alice`, `Alice(2)`, ...)
//! - Join and departure notices
//! - Member count updates to every member
//! - Client-side speaking gate (at least two members)
//! - Automatic client reconnect with a pluggable retry policy
//!
//! # Architecture
//! - `Registry` holds names and connection handles behind one mutex
//! - Each accepted connection runs `handle_connection` on its own task
//! - `ChatClient` owns the socket and a background receive task
//! - `ChatSession` adds the speaking gate on top of `ChatClient`
//!
//! # Example
//! ```ignore
//! use chat_relay::ChatServer;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = ChatServer::bind("127.0.0.1:9999").await?;
//!     server.run_until_ctrl_c().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod console;
pub mod error;
pub mod events;
pub mod handler;
pub mod message;
pub mod registry;
pub mod retry;
pub mod server;
pub mod session;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use connection::Connection;
pub use error::{AppError, ClientError, ProtocolError};
pub use events::ChatEvents;
pub use handler::handle_connection;
pub use message::Frame;
pub use registry::Registry;
pub use retry::{FixedDelay, Immediate, RetryPolicy};
pub use server::ChatServer;
pub use session::{ChatSession, SpeakingGate};
pub use transport::{ChatClient, ConnectionState};
pub use types::{ConnectionId, DisplayName};
