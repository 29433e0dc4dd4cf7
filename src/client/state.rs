//! The observable connection state.

use std::fmt;

use tokio::sync::watch;
use tracing::debug;

/// Lifecycle of a [`TwitchClient`](super::TwitchClient).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// Not started yet.
    #[default]
    Disconnected,
    /// Opening the socket and logging in.
    Connecting,
    /// Logged in; events are flowing.
    Connected,
    /// A session ended; waiting before the next attempt.
    Reconnecting,
    /// Terminal. Nothing leaves this state.
    Closed,
}

impl ConnectionState {
    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// The single live state of a client, observable through `watch`.
#[derive(Debug)]
pub(crate) struct StateCell {
    tx: watch::Sender<ConnectionState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    pub fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Move to `next`. Returns `false` if the cell is already `Closed`.
    pub fn set(&self, next: ConnectionState) -> bool {
        let mut accepted = false;
        self.tx.send_if_modified(|state| {
            if state.is_closed() {
                return false;
            }
            accepted = true;
            if *state == next {
                return false;
            }
            debug!(from = %state, to = %next, "connection state");
            *state = next;
            true
        });
        accepted
    }
}
