//! Chat relay - Entry Point
//!
//! `chat_relay server` runs the server; `chat_relay client` runs the
//! interactive client.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_relay::cli::{Cli, Command};
use chat_relay::config::{CLIENT_LOG_FILTER, SERVER_LOG_FILTER};
use chat_relay::console::run_client;
use chat_relay::ChatServer;

/// Initialize logging with environment filter
///
/// Use RUST_LOG env var to control log level,
/// e.g. RUST_LOG=debug or RUST_LOG=chat_relay=trace.
/// Logs go to stderr so they never interleave with chat output.
fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Server(args) => {
            init_tracing(SERVER_LOG_FILTER);

            let server = ChatServer::bind(args.listen.as_str()).await?;
            info!("Chat server listening on {}", server.local_addr()?);

            server.run_until_ctrl_c().await;
        }
        Command::Client(args) => {
            init_tracing(CLIENT_LOG_FILTER);
            run_client(args).await?;
        }
    }

    Ok(())
}
