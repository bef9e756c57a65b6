//! Command line interface

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_ADDR, LISTEN_ENV, SERVER_ENV};
use crate::retry::{FixedDelay, Immediate, RetryPolicy};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat server.
    Server(ServerArgs),
    /// Connect to a server and chat.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Address to listen on.
    #[arg(long, env = LISTEN_ENV, default_value = DEFAULT_ADDR)]
    pub listen: String,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Name to join with. Prompted for when omitted.
    #[arg(long)]
    pub name: Option<String>,

    /// Address of the server.
    #[arg(long, env = SERVER_ENV, default_value = DEFAULT_ADDR)]
    pub server: String,

    /// Delay between connection attempts in milliseconds. 0 retries immediately.
    #[arg(long, default_value_t = 0)]
    pub retry_delay_ms: u64,
}

impl ClientArgs {
    /// Retry policy for both the initial connect loop and reconnects
    pub fn retry_policy(&self) -> Arc<dyn RetryPolicy> {
        if self.retry_delay_ms == 0 {
            Arc::new(Immediate)
        } else {
            Arc::new(FixedDelay {
                delay: Duration::from_millis(self.retry_delay_ms),
                max_attempts: None,
            })
        }
    }
}
