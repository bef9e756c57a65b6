use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chat_relay::{ChatEvents, ChatServer, ChatSession, ClientError, ConnectionState, Registry};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const EVENT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Message(String),
    Count(u8),
    Reconnect(bool),
}

struct Recorder {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChatEvents for Recorder {
    fn on_message(&self, text: &str) {
        let _ = self.tx.send(Event::Message(text.to_string()));
    }

    fn on_member_count_changed(&self, count: u8) {
        let _ = self.tx.send(Event::Count(count));
    }

    fn on_reconnect_status(&self, success: bool) {
        let _ = self.tx.send(Event::Reconnect(success));
    }
}

struct Member {
    session: ChatSession<Recorder>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl Member {
    async fn join(addr: &str, name: &str) -> Result<Self> {
        let (tx, events) = mpsc::unbounded_channel();
        let mut session = ChatSession::new(addr, name, Recorder { tx });
        let connected = session
            .try_connect()
            .await
            .with_context(|| format!("{name} failed to connect"))?;
        anyhow::ensure!(connected, "{name} was refused");
        Ok(Self { session, events })
    }

    async fn next_event(&mut self) -> Result<Event> {
        timeout(EVENT_TIMEOUT, self.events.recv())
            .await
            .context("timed out waiting for event")?
            .context("event channel closed")
    }

    async fn expect(&mut self, expected: Event) -> Result<()> {
        let event = self.next_event().await?;
        anyhow::ensure!(event == expected, "expected {expected:?}, got {event:?}");
        Ok(())
    }
}

struct TestServer {
    addr: String,
    registry: Arc<Registry>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Result<Self> {
        let server = ChatServer::bind("127.0.0.1:0").await?;
        let addr = server.local_addr()?.to_string();
        let registry = server.registry();
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.run_until(async move {
            let _ = shutdown_rx.await;
        }));
        Ok(Self {
            addr,
            registry,
            shutdown,
            task,
        })
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}

#[tokio::test]
async fn three_members_chat_end_to_end() -> Result<()> {
    let server = TestServer::start().await?;

    let mut alice = Member::join(&server.addr, "Alice").await?;
    alice.expect(Event::Count(1)).await?;

    let mut bob = Member::join(&server.addr, "Bob").await?;
    bob.expect(Event::Count(2)).await?;
    alice.expect(Event::Message("Bob joined".into())).await?;
    alice.expect(Event::Count(2)).await?;

    let mut alice2 = Member::join(&server.addr, "Alice").await?;
    alice2.expect(Event::Count(3)).await?;
    alice.expect(Event::Message("Alice(2) joined".into())).await?;
    alice.expect(Event::Count(3)).await?;
    bob.expect(Event::Message("Alice(2) joined".into())).await?;
    bob.expect(Event::Count(3)).await?;

    let names: Vec<String> = server
        .registry
        .names()
        .await
        .into_iter()
        .map(|n| n.0)
        .collect();
    assert_eq!(names, vec!["Alice", "Bob", "Alice(2)"]);
    assert!(server.registry.is_consistent().await);

    // Bob speaks; both Alices hear it
    bob.session.send("hi").await?;
    alice.expect(Event::Message("Bob: hi".into())).await?;
    alice2.expect(Event::Message("Bob: hi".into())).await?;

    // Bob's next event is Alice(2)'s reply, so his own line never came back
    alice2.session.send("hey").await?;
    bob.expect(Event::Message("Alice(2): hey".into())).await?;
    alice.expect(Event::Message("Alice(2): hey".into())).await?;

    alice2.session.disconnect().await;
    assert_eq!(alice2.session.state(), ConnectionState::Disconnected);
    bob.expect(Event::Message("Alice(2) disconnected".into())).await?;
    bob.expect(Event::Count(2)).await?;
    alice.expect(Event::Message("Alice(2) disconnected".into())).await?;
    alice.expect(Event::Count(2)).await?;

    bob.session.disconnect().await;
    alice.expect(Event::Message("Bob disconnected".into())).await?;
    alice.expect(Event::Count(1)).await?;

    // Alone again: the gate is closed
    assert!(!alice.session.can_speak());
    assert!(matches!(
        alice.session.send("anyone?").await,
        Err(ClientError::TooFewMembers)
    ));

    alice.session.disconnect().await;
    assert!(alice.events.try_recv().is_err());
    assert!(bob.events.try_recv().is_err());

    server.stop().await;
    Ok(())
}

#[tokio::test]
async fn gate_opens_when_second_member_joins() -> Result<()> {
    let server = TestServer::start().await?;

    let mut first = Member::join(&server.addr, "first").await?;
    first.expect(Event::Count(1)).await?;
    assert!(!first.session.can_speak());

    let mut second = Member::join(&server.addr, "second").await?;
    second.expect(Event::Count(2)).await?;
    first.expect(Event::Message("second joined".into())).await?;
    first.expect(Event::Count(2)).await?;

    assert!(first.session.can_speak());
    assert!(second.session.can_speak());

    let mut state = first.session.subscribe_state();
    first.session.disconnect().await;
    timeout(
        EVENT_TIMEOUT,
        state.wait_for(|s| *s == ConnectionState::Disconnected),
    )
    .await
    .context("timed out waiting for disconnect")??;

    second.expect(Event::Message("first disconnected".into())).await?;
    second.expect(Event::Count(1)).await?;
    assert!(!second.session.can_speak());

    second.session.disconnect().await;
    server.stop().await;
    Ok(())
}

#[tokio::test]
async fn departure_frees_name_for_reuse() -> Result<()> {
    let server = TestServer::start().await?;

    let mut one = Member::join(&server.addr, "Dana").await?;
    one.expect(Event::Count(1)).await?;
    let mut two = Member::join(&server.addr, "Dana").await?;
    two.expect(Event::Count(2)).await?;
    one.expect(Event::Message("Dana(2) joined".into())).await?;
    one.expect(Event::Count(2)).await?;

    two.session.disconnect().await;
    one.expect(Event::Message("Dana(2) disconnected".into())).await?;
    one.expect(Event::Count(1)).await?;

    let mut three = Member::join(&server.addr, "Dana").await?;
    three.expect(Event::Count(2)).await?;
    one.expect(Event::Message("Dana(2) joined".into())).await?;

    one.session.disconnect().await;
    three.session.disconnect().await;
    server.stop().await;
    Ok(())
}
