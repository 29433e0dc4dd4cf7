//! One connection, from opening the socket until it ends.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::codec::FramedRead;
use tracing::{info, trace, warn};

use crate::builder::BuilderRegistry;
use crate::error::{TokenizeError, TransportError};
use crate::event::TypedEvent;
use crate::message::ParsedLine;
use crate::transport::LineCodec;
use crate::writer::SessionWriter;

use super::state::ConnectionState;
use super::Inner;

const KEEPALIVE_PING: &str = "PING :tmi.twitch.tv";
const DEFAULT_PING_PAYLOAD: &str = "tmi.twitch.tv";

/// Server notices that mean the credentials were refused.
const AUTH_FAILURES: [&str; 2] = ["Login authentication failed", "Improperly formatted auth"];

/// Something an inbound line asks the session to do besides dispatching.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Signal {
    /// `001`: login completed.
    Welcome,
    /// `RECONNECT`.
    Reconnect,
    /// A login failure notice.
    AuthRejected(String),
}

/// The outcome of one inbound line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    /// Nothing to do.
    Drop,
    /// Answer with this control line; nothing is dispatched.
    Reply(String),
    /// Keep-alive traffic; nothing is dispatched.
    Keepalive,
    /// Dispatch `event`, then act on `signal`.
    Event {
        event: TypedEvent,
        raw: String,
        signal: Option<Signal>,
    },
}

/// Classify one inbound line. No I/O happens here.
pub(crate) fn process(raw: &str, registry: &BuilderRegistry) -> Step {
    let line = match ParsedLine::parse(raw) {
        Ok(line) => line,
        Err(TokenizeError::EmptyLine) => {
            warn!("dropping empty line");
            return Step::Drop;
        }
        Err(e) => {
            warn!(error = %e, line = %raw, "dropping malformed line");
            return Step::Drop;
        }
    };

    if line.command_is("PING") {
        let payload = line.trailing().unwrap_or(DEFAULT_PING_PAYLOAD);
        return Step::Reply(format!("PONG :{payload}"));
    }
    if line.command_is("PONG") {
        return Step::Keepalive;
    }

    let signal = signal_for(&line);
    let event = registry.build(&line);
    Step::Event {
        event,
        raw: line.raw,
        signal,
    }
}

fn signal_for(line: &ParsedLine) -> Option<Signal> {
    if line.command == "001" {
        return Some(Signal::Welcome);
    }
    if line.command_is("RECONNECT") {
        return Some(Signal::Reconnect);
    }
    if line.command_is("NOTICE") {
        let text = line.trailing().unwrap_or_default();
        if AUTH_FAILURES.iter().any(|failure| text.contains(failure)) {
            return Some(Signal::AuthRejected(text.to_string()));
        }
    }
    None
}

// Durations come from configuration and may be absurdly large.
fn after(at: Instant, duration: Duration) -> Instant {
    at.checked_add(duration)
        .unwrap_or_else(|| at + Duration::from_secs(365 * 24 * 60 * 60))
}

/// How a session ended.
#[derive(Debug)]
pub(crate) enum SessionEnd {
    /// The client was closed.
    Cancelled,
    /// The server or the application asked for a reconnect.
    Reconnect,
    Failed(TransportError),
}

#[derive(Debug)]
pub(crate) struct SessionReport {
    pub end: SessionEnd,
    /// Time spent logged in; `None` if the welcome never arrived.
    pub connected_for: Option<Duration>,
}

impl SessionReport {
    fn before_login(end: SessionEnd) -> Self {
        Self {
            end,
            connected_for: None,
        }
    }
}

/// Run one session to completion.
pub(crate) async fn run(inner: &Inner) -> SessionReport {
    let config = &inner.config;
    let cancel = &inner.cancel;
    let mut reconnect = inner.reconnect.subscribe();

    let opened = tokio::select! {
        _ = cancel.cancelled() => return SessionReport::before_login(SessionEnd::Cancelled),
        opened = timeout(config.connect_timeout, inner.connector.connect()) => opened,
    };
    let stream = match opened {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            return SessionReport::before_login(SessionEnd::Failed(TransportError::Connect(e)))
        }
        Err(_) => {
            return SessionReport::before_login(SessionEnd::Failed(
                TransportError::ConnectTimeout(config.connect_timeout),
            ))
        }
    };

    let (read, write) = tokio::io::split(stream);
    let mut lines = FramedRead::new(read, LineCodec::new());
    let writer = SessionWriter::spawn(
        write,
        config.login_sequence(),
        inner.app.clone(),
        cancel.child_token(),
    );

    let handshake_deadline = after(Instant::now(), config.handshake_timeout);
    let mut connected_at: Option<Instant> = None;
    let mut last_traffic = Instant::now();
    let mut ping_sent: Option<Instant> = None;

    let end = loop {
        let deadline = match (connected_at, ping_sent) {
            (None, _) => handshake_deadline,
            (Some(_), Some(sent)) => after(sent, config.keepalive_timeout),
            (Some(_), None) => after(last_traffic, config.keepalive_idle),
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break SessionEnd::Cancelled,
            Ok(()) = reconnect.changed() => {
                info!("reconnect requested by application");
                break SessionEnd::Reconnect;
            }
            _ = writer.stopped() => break SessionEnd::Failed(TransportError::WriterStopped),
            frame = lines.next() => {
                let raw = match frame {
                    None => break SessionEnd::Failed(TransportError::ClosedByPeer),
                    Some(Err(e)) => break SessionEnd::Failed(TransportError::Io(e)),
                    Some(Ok(raw)) => raw,
                };
                trace!(line = %raw, "recv");
                last_traffic = Instant::now();
                ping_sent = None;

                match process(&raw, &inner.registry) {
                    Step::Drop | Step::Keepalive => {}
                    Step::Reply(reply) => {
                        writer.control(reply);
                    }
                    Step::Event { event, raw, signal } => {
                        inner.dispatcher.dispatch(&event, &raw);
                        match signal {
                            None => {}
                            Some(Signal::Welcome) => {
                                if connected_at.is_none() {
                                    connected_at = Some(Instant::now());
                                    writer.open();
                                    inner.state.set(ConnectionState::Connected);
                                    info!(channel = %config.channel, "connected");
                                    inner.dispatcher.connected();
                                }
                            }
                            Some(Signal::Reconnect) => {
                                info!("server requested reconnect");
                                break SessionEnd::Reconnect;
                            }
                            Some(Signal::AuthRejected(notice)) => {
                                break SessionEnd::Failed(TransportError::AuthRejected(notice));
                            }
                        }
                    }
                }
            }
            _ = sleep_until(deadline) => {
                if connected_at.is_none() {
                    break SessionEnd::Failed(TransportError::HandshakeTimeout(config.handshake_timeout));
                }
                if ping_sent.is_some() {
                    warn!(timeout = ?config.keepalive_timeout, "keep-alive timed out");
                    break SessionEnd::Failed(TransportError::KeepaliveTimeout);
                }
                trace!("idle, sending keep-alive ping");
                writer.control(KEEPALIVE_PING);
                ping_sent = Some(Instant::now());
            }
        }
    };

    writer.shutdown().await;
    SessionReport {
        end,
        connected_for: connected_at.map(|at| at.elapsed()),
    }
}
