//! Reconnect strategies.

use std::time::Duration;

use crate::config::ReconnectSettings;
use crate::error::TransportError;

/// What the policy gets to look at when a session fails.
#[derive(Debug)]
pub struct Failure<'a> {
    pub error: &'a TransportError,
    /// How long the session was logged in; `None` if it never got there.
    pub connected_for: Option<Duration>,
}

/// Decides whether and when to retry after a failed session.
///
/// Server-requested and application-forced reconnects bypass the policy.
pub trait ReconnectPolicy: Send {
    /// A session that had completed its login ended. Called before
    /// [`next_delay`](Self::next_delay) for that session.
    fn on_connected(&mut self) {}

    /// Delay before the next attempt, or `None` to give up for good.
    fn next_delay(&mut self, failure: &Failure<'_>) -> Option<Duration>;
}

/// Retry up to a fixed number of consecutive failures with exponential
/// backoff.
///
/// The failure count only resets after a session stayed connected for
/// [`ReconnectSettings::stable_after`], so a server that accepts the socket
/// and drops it right after login still exhausts the budget. Rejected
/// credentials are never retried.
#[derive(Clone, Debug)]
pub struct BoundedRetry {
    settings: ReconnectSettings,
    attempts: u32,
}

impl BoundedRetry {
    pub fn new(settings: ReconnectSettings) -> Self {
        Self {
            settings,
            attempts: 0,
        }
    }

    /// Consecutive failures counted so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.settings.delay.as_secs_f64();
        let max = self.settings.max_delay.as_secs_f64();
        let factor = self.settings.backoff_factor.max(1.0);
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = base * factor.powi(exp);
        if !secs.is_finite() || secs >= max {
            self.settings.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

impl Default for BoundedRetry {
    fn default() -> Self {
        Self::new(ReconnectSettings::default())
    }
}

impl ReconnectPolicy for BoundedRetry {
    fn next_delay(&mut self, failure: &Failure<'_>) -> Option<Duration> {
        if failure.error.is_auth_rejected() {
            return None;
        }
        if failure
            .connected_for
            .is_some_and(|up| up >= self.settings.stable_after)
        {
            self.attempts = 0;
        }
        if self.attempts >= self.settings.max_attempts {
            return None;
        }
        let delay = self.backoff(self.attempts);
        self.attempts += 1;
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(max_attempts: u32) -> ReconnectSettings {
        ReconnectSettings {
            max_attempts,
            delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(5),
            stable_after: Duration::from_secs(30),
        }
    }

    fn lost(connected_for: Option<Duration>) -> (TransportError, Option<Duration>) {
        (TransportError::ClosedByPeer, connected_for)
    }

    fn next(policy: &mut BoundedRetry, (error, connected_for): &(TransportError, Option<Duration>)) -> Option<Duration> {
        policy.next_delay(&Failure {
            error,
            connected_for: *connected_for,
        })
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut policy = BoundedRetry::new(settings(10));
        let failure = lost(None);
        let delays: Vec<_> = (0..5).map(|_| next(&mut policy, &failure).unwrap()).collect();
        assert_eq!(
            delays,
            vec![1, 2, 4, 5, 5].into_iter().map(Duration::from_secs).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let mut policy = BoundedRetry::new(settings(2));
        let failure = lost(None);
        assert!(next(&mut policy, &failure).is_some());
        assert!(next(&mut policy, &failure).is_some());
        assert_eq!(next(&mut policy, &failure), None);
        assert_eq!(policy.attempts(), 2);
    }

    #[test]
    fn test_short_sessions_do_not_reset() {
        let mut policy = BoundedRetry::new(settings(2));
        let flapping = lost(Some(Duration::from_secs(1)));
        assert!(next(&mut policy, &flapping).is_some());
        assert!(next(&mut policy, &flapping).is_some());
        assert_eq!(next(&mut policy, &flapping), None);
    }

    #[test]
    fn test_stable_session_resets() {
        let mut policy = BoundedRetry::new(settings(1));
        assert!(next(&mut policy, &lost(None)).is_some());
        assert_eq!(next(&mut policy, &lost(None)), None);
        assert_eq!(
            next(&mut policy, &lost(Some(Duration::from_secs(60)))),
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_auth_rejection_is_fatal() {
        let mut policy = BoundedRetry::default();
        let failure = (TransportError::AuthRejected("Login authentication failed".into()), None);
        assert_eq!(next(&mut policy, &failure), None);
        assert_eq!(policy.attempts(), 0);
    }

    #[test]
    fn test_zero_attempts_never_retries() {
        let mut policy = BoundedRetry::new(settings(0));
        assert_eq!(next(&mut policy, &lost(None)), None);
    }
}
