//! Console rendering and the interactive client loop

use std::io::{self, Write};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::cli::ClientArgs;
use crate::error::ClientError;
use crate::events::ChatEvents;
use crate::retry::{pause, RetryPolicy};
use crate::session::{ChatSession, MIN_MEMBERS_TO_SPEAK};

const TOO_FEW_MEMBERS: &str = "Too few members. Waiting another member...";

/// Print one line while holding the stdout lock
pub fn print_line(line: &str) {
    let mut stdout = io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{}", line) {
        warn!("Failed to write to stdout: {}", e);
    }
}

/// Render hooks that print to the terminal
#[derive(Debug, Default)]
pub struct ConsoleRenderer;

impl ChatEvents for ConsoleRenderer {
    fn on_message(&self, text: &str) {
        print_line(text);
    }

    fn on_member_count_changed(&self, count: u8) {
        if count < MIN_MEMBERS_TO_SPEAK {
            print_line(TOO_FEW_MEMBERS);
        }
    }

    fn on_reconnect_status(&self, success: bool) {
        if success {
            print_line("Connected to server again.");
        } else {
            print_line("Server connection failed. Trying to reconnect...");
        }
    }
}

/// Run the interactive client until Ctrl+C or end of input
pub async fn run_client(args: ClientArgs) -> Result<(), ClientError> {
    print_line("Welcome to the chat! Press Ctrl+C for exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let name = match args.name.clone() {
        Some(name) => name,
        None => {
            print_line("Enter your name: ");
            match lines.next_line().await? {
                Some(name) => name,
                None => return Ok(()),
            }
        }
    };
    print_line(&format!("Hello {}! Trying to connect... ", name));

    let retry = args.retry_policy();
    let mut session = ChatSession::with_retry_policy(
        args.server.clone(),
        name,
        ConsoleRenderer,
        Arc::clone(&retry),
    );

    tokio::select! {
        connected = connect_until_success(&mut session, retry.as_ref()) => {
            if !connected? {
                print_line("Could not connect to server.");
                return Ok(());
            }
        }
        _ = tokio::signal::ctrl_c() => return Ok(()),
    }
    print_line("Connected to server.");

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => submit(&session, &line).await,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.disconnect().await;
    Ok(())
}

/// Retry `try_connect` as the policy allows; `Ok(false)` if it gave up
async fn connect_until_success(
    session: &mut ChatSession<ConsoleRenderer>,
    retry: &dyn RetryPolicy,
) -> Result<bool, ClientError> {
    let mut failures: u32 = 0;
    while !session.try_connect().await? {
        failures = failures.saturating_add(1);
        print_line(&format!("Failed. Trying again({})...", failures));
        match retry.next_delay(failures) {
            Some(delay) => pause(delay).await,
            None => return Ok(false),
        }
    }
    Ok(true)
}

/// What to do with one line of user input
#[derive(Debug, PartialEq, Eq)]
enum InputAction {
    /// Gate closed: print the notice, even for an empty line
    Reject,
    Skip,
    Send,
}

fn classify_input(can_speak: bool, line: &str) -> InputAction {
    if !can_speak {
        InputAction::Reject
    } else if line.is_empty() {
        InputAction::Skip
    } else {
        InputAction::Send
    }
}

async fn submit(session: &ChatSession<ConsoleRenderer>, line: &str) {
    match classify_input(session.can_speak(), line) {
        InputAction::Reject => print_line(TOO_FEW_MEMBERS),
        InputAction::Skip => {}
        InputAction::Send => match session.send(line).await {
            Ok(()) => {}
            Err(ClientError::TooFewMembers) => print_line(TOO_FEW_MEMBERS),
            Err(ClientError::NotConnected) => print_line("Not connected, message dropped."),
            Err(e) => warn!("Failed to send message: {}", e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_gate_rejects_empty_line() {
        assert_eq!(classify_input(false, ""), InputAction::Reject);
        assert_eq!(classify_input(false, "hello"), InputAction::Reject);
    }

    #[test]
    fn test_open_gate_skips_only_empty_line() {
        assert_eq!(classify_input(true, ""), InputAction::Skip);
        assert_eq!(classify_input(true, "hello"), InputAction::Send);
    }
}
