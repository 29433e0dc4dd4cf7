//! The outbound half of the connection.
//!
//! Application lines go through an [`OutboundQueue`] that outlives sessions
//! and is drained under a sliding-window [`RateLimit`], but only once the
//! session is logged in. Each session spawns one drain task that also owns a
//! priority channel for control lines (login, `PONG`, keep-alive `PING`),
//! which are not charged against the budget. The drain task is the only code
//! that writes to the socket.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::transport::LineCodec;

/// Send budget: at most `messages` lines per sliding `window`.
///
/// `messages == 0` disables limiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RateLimit {
    pub messages: u32,
    pub window: Duration,
}

impl RateLimit {
    /// Regular accounts.
    pub const DEFAULT: RateLimit = RateLimit::new(20, Duration::from_secs(30));
    /// Moderators, broadcasters and verified bots.
    pub const ELEVATED: RateLimit = RateLimit::new(100, Duration::from_secs(30));

    pub const fn new(messages: u32, window: Duration) -> Self {
        Self { messages, window }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Sliding-window send accounting.
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    sent: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            sent: VecDeque::with_capacity(limit.messages as usize),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Time until the next line may go out; zero when it may go now.
    pub fn delay(&mut self, now: Instant) -> Duration {
        if self.limit.messages == 0 {
            return Duration::ZERO;
        }
        while let Some(&oldest) = self.sent.front() {
            if now.saturating_duration_since(oldest) >= self.limit.window {
                self.sent.pop_front();
            } else {
                break;
            }
        }
        if self.sent.len() < self.limit.messages as usize {
            return Duration::ZERO;
        }
        match self.sent.front() {
            Some(&oldest) => (oldest + self.limit.window).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Charge one line sent at `now`.
    pub fn record(&mut self, now: Instant) {
        if self.limit.messages > 0 {
            self.sent.push_back(now);
        }
    }

    /// Wait for budget and charge one line. Cancel safe: nothing is charged
    /// unless the wait completes.
    pub async fn acquire(&mut self) {
        loop {
            let wait = self.delay(Instant::now());
            if wait.is_zero() {
                self.record(Instant::now());
                return;
            }
            trace!(?wait, "send budget exhausted");
            sleep(wait).await;
        }
    }
}

/// Producer handle for application lines. Cheap to clone; never blocks.
#[derive(Clone, Debug)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl OutboundQueue {
    /// Enqueue a line. Returns `false` once the queue has been shut down.
    pub fn push(&self, line: impl Into<String>) -> bool {
        self.tx.send(line.into()).is_ok()
    }
}

/// Consumer side of the application queue, handed from session to session.
#[derive(Debug)]
pub(crate) struct AppQueue {
    rx: mpsc::UnboundedReceiver<String>,
    limiter: RateLimiter,
    // A line taken off the queue but not yet written.
    pending: Option<String>,
}

impl AppQueue {
    /// Wait until a line is available and budgeted. The line stays in
    /// `pending`, so dropping this future never loses it.
    async fn ready(&mut self) -> Option<()> {
        if self.pending.is_none() {
            self.pending = Some(self.rx.recv().await?);
        }
        self.limiter.acquire().await;
        Some(())
    }
}

/// Create the application queue.
pub(crate) fn outbound(limit: RateLimit) -> (OutboundQueue, Arc<Mutex<AppQueue>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let queue = AppQueue {
        rx,
        limiter: RateLimiter::new(limit),
        pending: None,
    };
    (OutboundQueue { tx }, Arc::new(Mutex::new(queue)))
}

/// The drain task of one session.
pub(crate) struct SessionWriter {
    control: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    open: CancellationToken,
    stopped: CancellationToken,
    task: JoinHandle<io::Result<()>>,
}

impl SessionWriter {
    /// Spawn the drain task over `sink`, writing `greeting` first. It stops
    /// when `cancel` fires, the application queue closes, or a write fails.
    pub fn spawn<W>(
        sink: W,
        greeting: Vec<String>,
        app: Arc<Mutex<AppQueue>>,
        cancel: CancellationToken,
    ) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (control, control_rx) = mpsc::unbounded_channel();
        for line in greeting {
            let _ = control.send(line);
        }
        let open = CancellationToken::new();
        let stopped = CancellationToken::new();
        let task = tokio::spawn({
            let gates = Gates {
                cancel: cancel.clone(),
                open: open.clone(),
            };
            let stopped = stopped.clone();
            async move {
                let sink = FramedWrite::new(sink, LineCodec::new());
                let result = drain(sink, control_rx, app, gates).await;
                if let Err(e) = &result {
                    warn!(error = %e, "write failed");
                }
                stopped.cancel();
                result
            }
        });
        Self {
            control,
            cancel,
            open,
            stopped,
            task,
        }
    }

    /// Send a control line ahead of queued application lines.
    pub fn control(&self, line: impl Into<String>) -> bool {
        self.control.send(line.into()).is_ok()
    }

    /// Start draining application lines.
    pub fn open(&self) {
        self.open.cancel();
    }

    /// Resolves once the drain task has exited.
    pub async fn stopped(&self) {
        self.stopped.cancelled().await
    }

    /// Stop the drain task and wait for it, releasing the application queue.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "writer task panicked");
        }
    }
}

struct Gates {
    cancel: CancellationToken,
    open: CancellationToken,
}

async fn drain<W>(
    mut sink: FramedWrite<W, LineCodec>,
    mut control: mpsc::UnboundedReceiver<String>,
    app: Arc<Mutex<AppQueue>>,
    gates: Gates,
) -> io::Result<()>
where
    W: AsyncWrite + Send + Unpin,
{
    let Gates { cancel, open } = gates;
    // Held for the whole session; the next session waits for it.
    let mut app = tokio::select! {
        guard = app.lock_owned() => guard,
        _ = cancel.cancelled() => return Ok(()),
    };

    loop {
        let is_open = open.is_cancelled();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            line = control.recv() => match line {
                Some(line) => {
                    if !write_or_cancel(&mut sink, line, &cancel).await? {
                        return Ok(());
                    }
                }
                None => return Ok(()),
            },
            _ = open.cancelled(), if !is_open => {}
            ready = app.ready(), if is_open => match (ready, app.pending.clone()) {
                (Some(()), Some(line)) => {
                    // Cleared only once written; a cancelled write is retried
                    // by the next session.
                    if !write_or_cancel(&mut sink, line, &cancel).await? {
                        return Ok(());
                    }
                    app.pending = None;
                }
                _ => return Ok(()),
            },
        }
    }
}

/// Write one line unless `cancel` fires first. A peer that stops reading
/// can stall the write indefinitely. Returns `false` when cancelled.
async fn write_or_cancel<W>(
    sink: &mut FramedWrite<W, LineCodec>,
    line: String,
    cancel: &CancellationToken,
) -> io::Result<bool>
where
    W: AsyncWrite + Unpin,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(false),
        sent = write_line(sink, line) => sent.map(|()| true),
    }
}

async fn write_line<W>(sink: &mut FramedWrite<W, LineCodec>, line: String) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    trace!(line = %redact(&line), "send");
    sink.send(line).await
}

/// Hide the token in `PASS` lines before logging.
fn redact(line: &str) -> &str {
    if line.starts_with("PASS ") {
        "PASS ***"
    } else {
        line
    }
}
