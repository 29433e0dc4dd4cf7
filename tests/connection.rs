//! Integration tests for the connection lifecycle
//!
//! Every test drives a scripted in-memory server through a custom
//! connector, so no sockets are opened.

#![cfg(feature = "tokio")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::time::timeout;
use twirc::event::{ChatMessage, ModeChange};
use twirc::transport::BoxedStream;
use twirc::{
    ClientConfig, ClientError, ClientOptions, ConnectionState, DisconnectReason, EventListener,
    RateLimit, ReconnectSettings, TwitchClient,
};

const WAIT: Duration = Duration::from_secs(5);
const WELCOME: &str = ":tmi.twitch.tv 001 gikkbot :Welcome, GLHF!";

#[derive(Debug, PartialEq)]
enum Note {
    Raw(String),
    Message(String),
    Mode(String),
    Connected,
    Disconnected(DisconnectReason),
}

struct Recorder {
    tx: mpsc::UnboundedSender<Note>,
}

impl EventListener for Recorder {
    fn on_raw_line(&self, raw: &str) {
        let _ = self.tx.send(Note::Raw(raw.to_string()));
    }

    fn on_private_message(&self, message: &ChatMessage) {
        let _ = self.tx.send(Note::Message(message.text.clone()));
    }

    fn on_mode(&self, mode: &ModeChange) {
        let _ = self.tx.send(Note::Mode(mode.user.clone()));
    }

    fn on_connect(&self) {
        let _ = self.tx.send(Note::Connected);
    }

    fn on_disconnect(&self, reason: &DisconnectReason) {
        let _ = self.tx.send(Note::Disconnected(reason.clone()));
    }
}

/// Server end of one scripted connection.
struct Server {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    write: WriteHalf<DuplexStream>,
}

impl Server {
    fn new(stream: DuplexStream) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            lines: BufReader::new(read).lines(),
            write,
        }
    }

    async fn recv(&mut self) -> String {
        timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for client line")
            .expect("read failed")
            .expect("client closed the connection")
    }

    async fn send(&mut self, line: &str) {
        self.write
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .expect("write failed");
    }

    /// Read the login sequence and answer with the welcome numeric.
    async fn login(&mut self) -> Vec<String> {
        let mut login = Vec::new();
        for _ in 0..4 {
            login.push(self.recv().await);
        }
        self.send(WELCOME).await;
        login
    }
}

struct Harness {
    client: TwitchClient,
    connects: Arc<AtomicUsize>,
    servers: mpsc::UnboundedReceiver<DuplexStream>,
    notes: mpsc::UnboundedReceiver<Note>,
}

impl Harness {
    fn new(max_attempts: u32) -> Self {
        Self::scripted(max_attempts, 16 * 1024, |config| config)
    }

    /// Accept every connection over a duplex of `buffer` bytes.
    fn scripted(max_attempts: u32, buffer: usize, configure: fn(ClientConfig) -> ClientConfig) -> Self {
        let connects = Arc::new(AtomicUsize::new(0));
        let (server_tx, servers) = mpsc::unbounded_channel();
        let connector = {
            let connects = connects.clone();
            move || {
                let connects = connects.clone();
                let server_tx = server_tx.clone();
                async move {
                    connects.fetch_add(1, Ordering::SeqCst);
                    let (client, server) = tokio::io::duplex(buffer);
                    server_tx
                        .send(server)
                        .map_err(|_| anyhow::anyhow!("test server gone"))?;
                    Ok::<_, anyhow::Error>(Box::new(client) as BoxedStream)
                }
            }
        };
        Self::with_connector(max_attempts, connects, servers, connector, configure)
    }

    fn refusing(max_attempts: u32) -> Self {
        let connects = Arc::new(AtomicUsize::new(0));
        let (_, servers) = mpsc::unbounded_channel();
        let connector = {
            let connects = connects.clone();
            move || {
                connects.fetch_add(1, Ordering::SeqCst);
                async { Err::<BoxedStream, _>(anyhow::anyhow!("connection refused")) }
            }
        };
        Self::with_connector(max_attempts, connects, servers, connector, |config| config)
    }

    /// Accept the first connection, refuse every later one.
    fn accepting_once(max_attempts: u32) -> Self {
        let connects = Arc::new(AtomicUsize::new(0));
        let (server_tx, servers) = mpsc::unbounded_channel();
        let connector = {
            let connects = connects.clone();
            move || {
                let attempt = connects.fetch_add(1, Ordering::SeqCst);
                let server_tx = server_tx.clone();
                async move {
                    if attempt > 0 {
                        anyhow::bail!("connection refused");
                    }
                    let (client, server) = tokio::io::duplex(16 * 1024);
                    server_tx
                        .send(server)
                        .map_err(|_| anyhow::anyhow!("test server gone"))?;
                    Ok::<_, anyhow::Error>(Box::new(client) as BoxedStream)
                }
            }
        };
        Self::with_connector(max_attempts, connects, servers, connector, |config| config)
    }

    fn with_connector<C>(
        max_attempts: u32,
        connects: Arc<AtomicUsize>,
        servers: mpsc::UnboundedReceiver<DuplexStream>,
        connector: C,
        configure: fn(ClientConfig) -> ClientConfig,
    ) -> Self
    where
        C: twirc::Connector + 'static,
    {
        let config = ClientConfig::new("#Gikkman", "GikkBot", "oauth:secret")
            .with_owner("Gikkman")
            .with_handshake_timeout(WAIT)
            .with_reconnect(ReconnectSettings {
                max_attempts,
                delay: Duration::from_millis(10),
                backoff_factor: 1.0,
                max_delay: Duration::from_millis(10),
                stable_after: Duration::from_secs(30),
            });
        let config = configure(config);
        let client = TwitchClient::with_options(config, ClientOptions::new().with_connector(connector));

        let (tx, notes) = mpsc::unbounded_channel();
        client.add_listener(Recorder { tx });

        Self {
            client,
            connects,
            servers,
            notes,
        }
    }

    async fn accept(&mut self) -> Server {
        let stream = timeout(WAIT, self.servers.recv())
            .await
            .expect("timed out waiting for connect")
            .expect("connector dropped");
        Server::new(stream)
    }

    /// `connect()` against a server that logs the client in.
    async fn start(&mut self) -> Server {
        let connecting = tokio::spawn({
            let client = self.client.clone();
            async move { client.connect().await }
        });
        let mut server = self.accept().await;
        server.login().await;
        timeout(WAIT, connecting)
            .await
            .expect("connect timed out")
            .expect("connect task panicked")
            .expect("connect failed");
        server
    }

    async fn note(&mut self) -> Note {
        timeout(WAIT, self.notes.recv())
            .await
            .expect("timed out waiting for a callback")
            .expect("listener dropped")
    }

    /// Skip raw-line notes until something else arrives.
    async fn lifecycle(&mut self) -> Note {
        loop {
            match self.note().await {
                Note::Raw(_) => continue,
                note => return note,
            }
        }
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn test_login_sequence() {
    let mut harness = Harness::new(1);
    let connecting = tokio::spawn({
        let client = harness.client.clone();
        async move { client.connect().await }
    });

    let mut server = harness.accept().await;
    let login = server.login().await;
    assert!(login[0].starts_with("CAP REQ :"));
    assert_eq!(login[1], "PASS oauth:secret");
    assert_eq!(login[2], "NICK gikkbot");
    assert_eq!(login[3], "JOIN #gikkman");

    connecting.await.unwrap().unwrap();
    assert_eq!(harness.client.state(), ConnectionState::Connected);
    assert_eq!(harness.note().await, Note::Raw(WELCOME.to_string()));
    assert_eq!(harness.note().await, Note::Connected);

    harness.client.close().await;
}

#[tokio::test]
async fn test_events_are_dispatched_in_order() {
    let mut harness = Harness::new(1);
    let mut server = harness.start().await;
    assert_eq!(harness.lifecycle().await, Note::Connected);

    server.send(":jtv MODE #gikkman +o gikkbot").await;
    server
        .send(":gikkman!gikkman@gikkman.tmi.twitch.tv PRIVMSG #gikkman :hello bot")
        .await;

    assert_eq!(
        harness.note().await,
        Note::Raw(":jtv MODE #gikkman +o gikkbot".into())
    );
    assert_eq!(harness.note().await, Note::Mode("gikkbot".into()));
    assert_eq!(
        harness.note().await,
        Note::Raw(":gikkman!gikkman@gikkman.tmi.twitch.tv PRIVMSG #gikkman :hello bot".into())
    );
    assert_eq!(harness.note().await, Note::Message("hello bot".into()));

    harness.client.close().await;
}

#[tokio::test]
async fn test_ping_is_answered_without_dispatch() {
    let mut harness = Harness::new(1);
    let mut server = harness.start().await;
    assert_eq!(harness.lifecycle().await, Note::Connected);

    server.send("PING :tmi.twitch.tv").await;
    assert_eq!(server.recv().await, "PONG :tmi.twitch.tv");

    server.send(":tmi.twitch.tv 372 gikkbot :after ping").await;
    assert_eq!(
        harness.note().await,
        Note::Raw(":tmi.twitch.tv 372 gikkbot :after ping".into())
    );

    harness.client.close().await;
}

#[tokio::test]
async fn test_garbage_does_not_break_the_session() {
    let mut harness = Harness::new(1);
    let mut server = harness.start().await;
    assert_eq!(harness.lifecycle().await, Note::Connected);

    server.send("").await;
    server.send("@only=tags").await;
    server.send(":tmi.twitch.tv NEWTHING #gikkman :hi").await;

    assert_eq!(
        harness.note().await,
        Note::Raw(":tmi.twitch.tv NEWTHING #gikkman :hi".into())
    );
    assert_eq!(harness.client.state(), ConnectionState::Connected);

    harness.client.close().await;
}

#[tokio::test]
async fn test_reconnects_after_connection_loss() {
    let mut harness = Harness::new(3);
    let server = harness.start().await;
    assert_eq!(harness.lifecycle().await, Note::Connected);

    drop(server);
    let mut second = harness.accept().await;
    second.login().await;

    match harness.lifecycle().await {
        Note::Disconnected(DisconnectReason::ConnectionLost(_)) => {}
        other => panic!("expected ConnectionLost, got {other:?}"),
    }
    assert_eq!(harness.lifecycle().await, Note::Connected);
    assert_eq!(harness.connects(), 2);
    assert_eq!(harness.client.close_reason(), None);

    harness.client.close().await;
    assert_eq!(
        harness.lifecycle().await,
        Note::Disconnected(DisconnectReason::Closed)
    );
}

#[tokio::test]
async fn test_state_walks_through_reconnecting() {
    let mut harness = Harness::scripted(3, 16 * 1024, |config| {
        config.with_reconnect(ReconnectSettings {
            max_attempts: 3,
            delay: Duration::from_millis(100),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(100),
            stable_after: Duration::from_secs(30),
        })
    });
    let server = harness.start().await;
    let mut states = harness.client.subscribe_state();
    assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);

    drop(server);
    assert_eq!(next_state(&mut states).await, ConnectionState::Reconnecting);
    assert_eq!(next_state(&mut states).await, ConnectionState::Connecting);

    let mut second = harness.accept().await;
    second.login().await;
    assert_eq!(next_state(&mut states).await, ConnectionState::Connected);

    harness.client.close().await;
    assert_eq!(next_state(&mut states).await, ConnectionState::Closed);
}

async fn next_state(states: &mut tokio::sync::watch::Receiver<ConnectionState>) -> ConnectionState {
    timeout(WAIT, states.changed())
        .await
        .expect("timed out waiting for a state change")
        .expect("state channel closed");
    *states.borrow_and_update()
}

#[tokio::test]
async fn test_exhaustion_after_a_lost_connection() {
    let mut harness = Harness::accepting_once(2);
    let server = harness.start().await;
    assert_eq!(harness.lifecycle().await, Note::Connected);

    drop(server);
    match harness.lifecycle().await {
        Note::Disconnected(DisconnectReason::ConnectionLost(_)) => {}
        other => panic!("expected ConnectionLost, got {other:?}"),
    }
    match harness.lifecycle().await {
        Note::Disconnected(DisconnectReason::Exhausted(cause)) => {
            assert!(cause.contains("connection refused"), "{cause}");
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }

    timeout(WAIT, harness.client.closed()).await.unwrap();
    assert_eq!(harness.client.state(), ConnectionState::Closed);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(harness.notes.try_recv().is_err());
}

#[tokio::test]
async fn test_close_with_a_peer_that_stopped_reading() {
    let mut harness = Harness::scripted(1, 256, |config| {
        config.with_rate_limit(RateLimit::new(0, Duration::from_secs(30)))
    });
    let _server = harness.start().await;
    assert_eq!(harness.lifecycle().await, Note::Connected);

    for i in 0..200 {
        harness
            .client
            .channel_message(&format!("flood line number {i}"))
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    timeout(Duration::from_secs(3), harness.client.close())
        .await
        .expect("close() hung on a stalled socket");
    assert_eq!(harness.client.state(), ConnectionState::Closed);
    assert_eq!(
        harness.lifecycle().await,
        Note::Disconnected(DisconnectReason::Closed)
    );
}

#[tokio::test]
async fn test_keepalive_timeout_with_a_stalled_peer_reconnects() {
    let mut harness = Harness::scripted(3, 256, |config| {
        config
            .with_rate_limit(RateLimit::new(0, Duration::from_secs(30)))
            .with_keepalive(Duration::from_millis(100), Duration::from_millis(100))
    });
    let _stalled = harness.start().await;
    assert_eq!(harness.lifecycle().await, Note::Connected);

    for i in 0..200 {
        harness
            .client
            .channel_message(&format!("flood line number {i}"))
            .unwrap();
    }

    let mut second = harness.accept().await;
    second.login().await;
    match harness.lifecycle().await {
        Note::Disconnected(DisconnectReason::ConnectionLost(_)) => {}
        other => panic!("expected ConnectionLost, got {other:?}"),
    }
    assert_eq!(harness.lifecycle().await, Note::Connected);
    assert_eq!(harness.connects(), 2);

    harness.client.close().await;
}

#[tokio::test]
async fn test_exhaustion_is_reported_once() {
    let mut harness = Harness::refusing(2);

    let result = timeout(WAIT, harness.client.connect()).await.unwrap();
    assert!(matches!(result, Err(ClientError::ConnectFailed)));
    assert_eq!(harness.client.state(), ConnectionState::Closed);

    match harness.lifecycle().await {
        Note::Disconnected(reason) => assert!(reason.is_fatal()),
        other => panic!("expected a fatal disconnect, got {other:?}"),
    }
    assert_eq!(harness.connects(), 3);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.connects(), 3);
    assert!(harness.notes.try_recv().is_err());
    assert!(matches!(
        harness.client.close_reason(),
        Some(DisconnectReason::Exhausted(_))
    ));
}

#[tokio::test]
async fn test_server_reconnect_bypasses_retry_budget() {
    let mut harness = Harness::new(0);
    let mut server = harness.start().await;
    assert_eq!(harness.lifecycle().await, Note::Connected);

    server.send(":tmi.twitch.tv RECONNECT").await;
    let mut second = harness.accept().await;
    second.login().await;

    assert_eq!(
        harness.lifecycle().await,
        Note::Disconnected(DisconnectReason::ReconnectRequested)
    );
    assert_eq!(harness.lifecycle().await, Note::Connected);
    assert_eq!(harness.client.state(), ConnectionState::Connected);

    harness.client.close().await;
}

#[tokio::test]
async fn test_forced_reconnect() {
    let mut harness = Harness::new(0);
    let _server = harness.start().await;
    assert_eq!(harness.lifecycle().await, Note::Connected);

    harness.client.reconnect().unwrap();
    let mut second = harness.accept().await;
    second.login().await;

    assert_eq!(
        harness.lifecycle().await,
        Note::Disconnected(DisconnectReason::ReconnectRequested)
    );
    assert_eq!(harness.lifecycle().await, Note::Connected);

    harness.client.close().await;
}

#[tokio::test]
async fn test_auth_failure_is_not_retried() {
    let mut harness = Harness::new(5);
    let connecting = tokio::spawn({
        let client = harness.client.clone();
        async move { client.connect().await }
    });

    let mut server = harness.accept().await;
    for _ in 0..4 {
        server.recv().await;
    }
    server
        .send(":tmi.twitch.tv NOTICE * :Login authentication failed")
        .await;

    let result = timeout(WAIT, connecting).await.unwrap().unwrap();
    assert!(matches!(result, Err(ClientError::ConnectFailed)));
    assert_eq!(harness.connects(), 1);

    match harness.lifecycle().await {
        Note::Disconnected(DisconnectReason::Exhausted(cause)) => {
            assert!(cause.contains("Login authentication failed"), "{cause}");
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let mut harness = Harness::new(1);
    let _server = harness.start().await;
    assert_eq!(harness.lifecycle().await, Note::Connected);

    harness.client.close().await;
    harness.client.close().await;
    assert_eq!(harness.client.state(), ConnectionState::Closed);
    assert_eq!(
        harness.lifecycle().await,
        Note::Disconnected(DisconnectReason::Closed)
    );
    assert!(harness.notes.try_recv().is_err());

    assert!(matches!(
        harness.client.channel_message("too late"),
        Err(ClientError::Closed)
    ));
    assert!(matches!(harness.client.reconnect(), Err(ClientError::Closed)));
    assert!(matches!(harness.client.connect().await, Err(ClientError::Closed)));
}

#[tokio::test]
async fn test_close_before_connect() {
    let mut harness = Harness::new(1);
    harness.client.close().await;

    assert_eq!(harness.client.state(), ConnectionState::Closed);
    assert_eq!(harness.connects(), 0);
    assert!(harness.notes.try_recv().is_err());
    assert!(matches!(harness.client.connect().await, Err(ClientError::Closed)));
}

#[tokio::test]
async fn test_queued_lines_follow_login() {
    let mut harness = Harness::new(1);
    harness.client.channel_message("queued early").unwrap();
    harness.client.whisper("Ronni", "psst").unwrap();

    let mut server = harness.start().await;
    assert_eq!(server.recv().await, "PRIVMSG #gikkman :queued early");
    assert_eq!(server.recv().await, "PRIVMSG #jtv :/w ronni psst");

    harness.client.channel_message("after login").unwrap();
    assert_eq!(server.recv().await, "PRIVMSG #gikkman :after login");

    harness.client.close().await;
}
