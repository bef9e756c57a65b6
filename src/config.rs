//! Default configuration values
//!
//! Every value can be overridden from the command line or the environment
//! (see `cli.rs`). Log filtering uses `RUST_LOG`.

/// Default server address, used by both sides
pub const DEFAULT_ADDR: &str = "localhost:9999";

/// Environment variable overriding the server's bind address
pub const LISTEN_ENV: &str = "CHAT_RELAY_LISTEN";

/// Environment variable overriding the client's server address
pub const SERVER_ENV: &str = "CHAT_RELAY_SERVER";

/// Log filter for the server when `RUST_LOG` is unset
pub const SERVER_LOG_FILTER: &str = "chat_relay=info";

/// Log filter for the client when `RUST_LOG` is unset
pub const CLIENT_LOG_FILTER: &str = "chat_relay=warn";
