//! The self-healing Twitch chat connection.
//!
//! A [`TwitchClient`] owns one supervisor task. The supervisor runs sessions
//! back to back: open the socket through the [`Connector`], log in, read and
//! dispatch lines until the session ends, then ask the [`ReconnectPolicy`]
//! whether to try again. Outbound lines are queued and survive reconnects.
//!
//! ```no_run
//! use twirc::client::TwitchClient;
//! use twirc::config::ClientConfig;
//! use twirc::dispatch::EventListener;
//! use twirc::event::ChatMessage;
//!
//! struct Printer;
//!
//! impl EventListener for Printer {
//!     fn on_private_message(&self, message: &ChatMessage) {
//!         println!("{}: {}", message.sender.display_name, message.text);
//!     }
//! }
//!
//! # async fn run() -> Result<(), twirc::error::ClientError> {
//! let client = TwitchClient::new(ClientConfig::new("gikkman", "gikkbot", "oauth:token"));
//! client.add_listener(Printer);
//! client.connect().await?;
//! client.channel_message("hello chat")?;
//! client.closed().await;
//! # Ok(())
//! # }
//! ```

mod policy;
mod session;
mod state;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::builder::{BuildContext, BuilderRegistry, EventBuilder};
use crate::config::ClientConfig;
use crate::dispatch::{DisconnectReason, Dispatcher, EventListener};
use crate::error::ClientError;
use crate::transport::{Connector, TcpConnector};
use crate::util::{chat_line, whisper_line};
use crate::writer::{outbound, AppQueue, OutboundQueue};

pub use self::policy::{BoundedRetry, Failure, ReconnectPolicy};
pub use self::state::ConnectionState;

use self::session::{SessionEnd, SessionReport};
use self::state::StateCell;

/// Plug-ins that cannot live in [`ClientConfig`].
///
/// Anything left unset falls back to the default built from the config.
#[derive(Default)]
pub struct ClientOptions {
    builders: Vec<(String, Arc<dyn EventBuilder>)>,
    policy: Option<Box<dyn ReconnectPolicy>>,
    connector: Option<Arc<dyn Connector>>,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the builder for `command`.
    pub fn with_builder<B>(mut self, command: &str, builder: B) -> Self
    where
        B: EventBuilder + 'static,
    {
        self.builders.push((command.to_string(), Arc::new(builder)));
        self
    }

    pub fn with_policy<P>(mut self, policy: P) -> Self
    where
        P: ReconnectPolicy + 'static,
    {
        self.policy = Some(Box::new(policy));
        self
    }

    pub fn with_connector<C>(mut self, connector: C) -> Self
    where
        C: Connector + 'static,
    {
        self.connector = Some(Arc::new(connector));
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let commands: Vec<&str> = self.builders.iter().map(|(c, _)| c.as_str()).collect();
        f.debug_struct("ClientOptions")
            .field("builders", &commands)
            .field("policy", &self.policy.is_some())
            .field("connector", &self.connector.is_some())
            .finish()
    }
}

pub(crate) struct Inner {
    config: ClientConfig,
    registry: BuilderRegistry,
    dispatcher: Dispatcher,
    connector: Arc<dyn Connector>,
    policy: Mutex<Option<Box<dyn ReconnectPolicy>>>,
    state: StateCell,
    queue: OutboundQueue,
    app: Arc<tokio::sync::Mutex<AppQueue>>,
    cancel: CancellationToken,
    reconnect: watch::Sender<u64>,
    started: AtomicBool,
    final_reason: OnceLock<DisconnectReason>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a Twitch chat connection. Clones share the same connection.
#[derive(Clone)]
pub struct TwitchClient {
    inner: Arc<Inner>,
}

impl TwitchClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_options(config, ClientOptions::default())
    }

    /// Build a client, resolving every unset option from `config`.
    pub fn with_options(config: ClientConfig, options: ClientOptions) -> Self {
        let ctx = BuildContext::new(config.nick.clone(), config.owner.clone());
        let mut registry = BuilderRegistry::new(ctx);
        for (command, builder) in options.builders {
            registry.register_shared(&command, builder);
        }

        let policy = options.policy.unwrap_or_else(|| {
            Box::new(BoundedRetry::new(config.reconnect.clone())) as Box<dyn ReconnectPolicy>
        });
        let connector = options.connector.unwrap_or_else(|| {
            Arc::new(TcpConnector::new(config.server.clone(), config.port, config.tls))
                as Arc<dyn Connector>
        });
        let (queue, app) = outbound(config.effective_rate_limit());
        let (reconnect, _) = watch::channel(0);

        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                dispatcher: Dispatcher::new(),
                connector,
                policy: Mutex::new(Some(policy)),
                state: StateCell::new(),
                queue,
                app,
                cancel: CancellationToken::new(),
                reconnect,
                started: AtomicBool::new(false),
                final_reason: OnceLock::new(),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn add_listener<L>(&self, listener: L)
    where
        L: EventListener + 'static,
    {
        self.inner.dispatcher.add_listener(Arc::new(listener));
    }

    /// Add a listener the caller keeps a handle to.
    pub fn add_shared_listener(&self, listener: Arc<dyn EventListener>) {
        self.inner.dispatcher.add_listener(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn EventListener>) -> bool {
        self.inner.dispatcher.remove_listener(listener)
    }

    /// Start the connection and wait for the first successful login.
    ///
    /// Fails with [`ClientError::ConnectFailed`] when the reconnect policy
    /// gives up first. Must be called from within a tokio runtime.
    pub async fn connect(&self) -> Result<(), ClientError> {
        if self.inner.cancel.is_cancelled() {
            return Err(ClientError::Closed);
        }
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyStarted);
        }

        let policy = self
            .inner
            .policy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| {
                Box::new(BoundedRetry::new(self.inner.config.reconnect.clone()))
                    as Box<dyn ReconnectPolicy>
            });
        let handle = tokio::spawn(supervise(self.inner.clone(), policy));
        *self.inner.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        let mut rx = self.inner.state.subscribe();
        let reached = rx
            .wait_for(|state| matches!(state, ConnectionState::Connected | ConnectionState::Closed))
            .await
            .map(|state| *state);
        match reached {
            Ok(ConnectionState::Connected) => Ok(()),
            _ => Err(self.closed_error()),
        }
    }

    fn closed_error(&self) -> ClientError {
        match self.inner.final_reason.get() {
            Some(DisconnectReason::Exhausted(_)) => ClientError::ConnectFailed,
            _ => ClientError::Closed,
        }
    }

    /// Queue a raw line. Never blocks; the line goes out once a session is
    /// logged in and the send budget allows.
    pub fn send(&self, line: impl Into<String>) -> Result<(), ClientError> {
        if self.inner.state.get().is_closed() || !self.inner.queue.push(line) {
            return Err(ClientError::Closed);
        }
        Ok(())
    }

    /// Say `text` in the configured channel.
    pub fn channel_message(&self, text: &str) -> Result<(), ClientError> {
        self.send(chat_line(&self.inner.config.channel, text))
    }

    /// Whisper `text` to `user`.
    pub fn whisper(&self, user: &str, text: &str) -> Result<(), ClientError> {
        self.send(whisper_line(user, text))
    }

    /// End the current session and connect again right away, regardless of
    /// the retry budget.
    pub fn reconnect(&self) -> Result<(), ClientError> {
        if self.inner.state.get().is_closed() {
            return Err(ClientError::Closed);
        }
        if !self.inner.started.load(Ordering::SeqCst) {
            debug!("reconnect ignored, client not started");
            return Ok(());
        }
        self.inner.reconnect.send_modify(|generation| *generation += 1);
        Ok(())
    }

    /// Stop reconnecting, drop the socket and wait for the supervisor to
    /// finish. Calling it again is a no-op.
    pub async fn close(&self) {
        self.inner.cancel.cancel();
        if !self.inner.started.swap(true, Ordering::SeqCst) {
            let _ = self.inner.final_reason.set(DisconnectReason::Closed);
            self.inner.state.set(ConnectionState::Closed);
            return;
        }

        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match task {
            Some(task) => {
                if let Err(e) = task.await {
                    warn!(error = %e, "supervisor task failed");
                    self.inner.state.set(ConnectionState::Closed);
                }
            }
            None => self.closed().await,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Resolves once the client is `Closed`, by `close()` or because the
    /// reconnect policy gave up.
    pub async fn closed(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|state| state.is_closed()).await;
    }

    /// Why the client closed, once it has.
    pub fn close_reason(&self) -> Option<DisconnectReason> {
        self.inner.final_reason.get().cloned()
    }
}

impl fmt::Debug for TwitchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitchClient")
            .field("config", &self.inner.config)
            .field("state", &self.inner.state.get())
            .field("listeners", &self.inner.dispatcher.len())
            .finish()
    }
}

async fn supervise(inner: Arc<Inner>, mut policy: Box<dyn ReconnectPolicy>) {
    let reason = loop {
        inner.state.set(ConnectionState::Connecting);
        let SessionReport { end, connected_for } = session::run(&inner).await;
        if connected_for.is_some() {
            policy.on_connected();
        }

        let error = match end {
            SessionEnd::Cancelled => break DisconnectReason::Closed,
            SessionEnd::Reconnect => {
                inner.state.set(ConnectionState::Reconnecting);
                if connected_for.is_some() {
                    inner.dispatcher.disconnected(&DisconnectReason::ReconnectRequested);
                }
                continue;
            }
            SessionEnd::Failed(error) => error,
        };

        let failure = Failure {
            error: &error,
            connected_for,
        };
        let Some(delay) = policy.next_delay(&failure) else {
            error!(error = %error, "giving up on reconnecting");
            break DisconnectReason::Exhausted(error.to_string());
        };

        warn!(error = %error, ?delay, "session ended, reconnecting");
        inner.state.set(ConnectionState::Reconnecting);
        if connected_for.is_some() {
            inner
                .dispatcher
                .disconnected(&DisconnectReason::ConnectionLost(error.to_string()));
        }

        let mut forced = inner.reconnect.subscribe();
        tokio::select! {
            _ = inner.cancel.cancelled() => break DisconnectReason::Closed,
            _ = tokio::time::sleep(delay) => {}
            Ok(()) = forced.changed() => debug!("skipping reconnect delay"),
        }
    };

    inner.cancel.cancel();
    let _ = inner.final_reason.set(reason.clone());
    inner.state.set(ConnectionState::Closed);
    info!(%reason, "client closed");
    inner.dispatcher.disconnected(&reason);
}
