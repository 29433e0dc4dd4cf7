//! Error types for the Twitch chat client.
//!
//! Errors are layered the same way the connection is: a [`TokenizeError`]
//! affects one inbound line, a [`BuildError`] one typed event, a
//! [`TransportError`] one session, and a [`ClientError`] is what the public
//! client operations return.

use thiserror::Error;

/// Convenience type alias for Results using [`TokenizeError`].
pub type Result<T, E = TokenizeError> = std::result::Result<T, E>;

/// Errors encountered when splitting a raw line into a
/// [`ParsedLine`](crate::message::ParsedLine).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TokenizeError {
    /// The line was empty or contained only whitespace.
    #[error("empty line")]
    EmptyLine,

    /// The line had tags and/or a prefix but no command token.
    #[error("missing command")]
    MissingCommand,
}

/// Errors reported by an [`EventBuilder`](crate::builder::EventBuilder).
///
/// The registry never surfaces these to listeners: a failed build degrades
/// to [`TypedEvent::Unknown`](crate::event::TypedEvent::Unknown).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BuildError {
    /// The builder does not handle this particular line.
    #[error("{command} builder does not apply: {reason}")]
    NotApplicable {
        /// Command token of the line.
        command: String,
        /// Why the builder declined.
        reason: &'static str,
    },

    /// A field the event cannot exist without is missing.
    #[error("{command} is missing required field {field}")]
    MissingField {
        /// Command token of the line.
        command: String,
        /// Name of the missing tag or parameter.
        field: &'static str,
    },

    /// A required field is present but malformed.
    #[error("{command} has invalid {field}: {value:?}")]
    InvalidField {
        /// Command token of the line.
        command: String,
        /// Name of the tag or parameter.
        field: &'static str,
        /// The offending value.
        value: String,
    },
}

impl BuildError {
    pub(crate) fn missing(command: &str, field: &'static str) -> Self {
        Self::MissingField {
            command: command.to_ascii_uppercase(),
            field,
        }
    }

    pub(crate) fn invalid(command: &str, field: &'static str, value: &str) -> Self {
        Self::InvalidField {
            command: command.to_ascii_uppercase(),
            field,
            value: value.to_string(),
        }
    }

    pub(crate) fn not_applicable(command: &str, reason: &'static str) -> Self {
        Self::NotApplicable {
            command: command.to_ascii_uppercase(),
            reason,
        }
    }
}

/// Failures that end a session and are handed to the reconnect policy.
#[cfg(feature = "tokio")]
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The connector could not open a stream.
    #[error("connect failed: {0:#}")]
    Connect(anyhow::Error),

    /// The connector did not finish within the connect timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// The server did not send its welcome within the handshake timeout.
    #[error("login handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),

    /// Reading from the socket failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The server closed the socket.
    #[error("connection closed by peer")]
    ClosedByPeer,

    /// Nothing was received within the keep-alive timeout.
    #[error("no traffic within keep-alive timeout")]
    KeepaliveTimeout,

    /// The server rejected the credentials.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// The writer task stopped, usually because a write failed.
    #[error("writer stopped")]
    WriterStopped,
}

#[cfg(feature = "tokio")]
impl TransportError {
    /// Whether the server refused the login credentials.
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::AuthRejected(_))
    }
}

/// Errors returned by [`TwitchClient`](crate::client::TwitchClient) operations.
#[cfg(feature = "tokio")]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientError {
    /// `connect` was called on a client that was already started.
    #[error("client already started")]
    AlreadyStarted,

    /// The client is closed and accepts no more work.
    #[error("client is closed")]
    Closed,

    /// The reconnect policy gave up before a session was established.
    #[error("could not establish a connection")]
    ConnectFailed,
}
