//! Client configuration.
//!
//! [`ClientConfig`] is a plain value: every field has a default, and the
//! client reads it once when it is built. Plug-ins that cannot be serialized
//! (builders, reconnect policy, connector) live in
//! [`ClientOptions`](crate::client::ClientOptions) instead.

use std::fmt;
use std::time::Duration;

use crate::caps::{cap_req, Capability};
use crate::util::{normalize_channel, pass_token};
use crate::writer::RateLimit;

/// Default chat server.
pub const DEFAULT_SERVER: &str = "irc.chat.twitch.tv";
/// Default TLS port.
pub const DEFAULT_TLS_PORT: u16 = 6697;
/// Plain-text port.
pub const DEFAULT_PLAIN_PORT: u16 = 6667;

/// Reconnect tuning for the default policy.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReconnectSettings {
    /// Consecutive failed attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,
    /// Upper bound for the delay.
    pub max_delay: Duration,
    /// A session that stayed up this long resets the attempt count.
    pub stable_after: Duration,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            stable_after: Duration::from_secs(30),
        }
    }
}

/// Everything needed to log in and stay connected.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClientConfig {
    pub server: String,
    pub port: u16,
    pub tls: bool,
    /// Bot login.
    pub nick: String,
    /// OAuth token, with or without the `oauth:` prefix.
    pub oauth_token: String,
    /// Channel to join, without `#`.
    pub channel: String,
    /// Login classified as the bot owner. Empty means nobody.
    pub owner: String,
    pub capabilities: Vec<Capability>,
    pub reconnect: ReconnectSettings,
    /// Overrides the budget otherwise chosen from `elevated`.
    pub rate_limit: Option<RateLimit>,
    /// Use the moderator / verified bot budget.
    pub elevated: bool,
    pub connect_timeout: Duration,
    /// How long to wait for the `001` welcome after logging in.
    pub handshake_timeout: Duration,
    /// Silence after which the client sends its own `PING`.
    pub keepalive_idle: Duration,
    /// How long to wait for any traffic after that `PING`.
    pub keepalive_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_TLS_PORT,
            tls: true,
            nick: String::new(),
            oauth_token: String::new(),
            channel: String::new(),
            owner: String::new(),
            capabilities: Capability::DEFAULT.to_vec(),
            reconnect: ReconnectSettings::default(),
            rate_limit: None,
            elevated: false,
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(15),
            keepalive_idle: Duration::from_secs(5 * 60),
            keepalive_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Configuration for joining `channel` as `nick`. The channel may be
    /// given with or without `#`; names are lowercased.
    pub fn new(channel: &str, nick: &str, oauth_token: impl Into<String>) -> Self {
        Self {
            channel: normalize_channel(channel),
            nick: nick.trim().to_ascii_lowercase(),
            oauth_token: oauth_token.into(),
            ..Self::default()
        }
    }

    pub fn with_server(mut self, server: impl Into<String>, port: u16) -> Self {
        self.server = server.into();
        self.port = port;
        self
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectSettings) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    pub fn with_elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_keepalive(mut self, idle: Duration, timeout: Duration) -> Self {
        self.keepalive_idle = idle;
        self.keepalive_timeout = timeout;
        self
    }

    /// The send budget in effect.
    pub fn effective_rate_limit(&self) -> RateLimit {
        match self.rate_limit {
            Some(limit) => limit,
            None if self.elevated => RateLimit::ELEVATED,
            None => RateLimit::DEFAULT,
        }
    }

    /// The lines sent right after the socket opens, in order.
    pub fn login_sequence(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(4);
        lines.extend(cap_req(&self.capabilities));
        lines.push(format!("PASS {}", pass_token(&self.oauth_token)));
        lines.push(format!("NICK {}", self.nick));
        lines.push(format!("JOIN #{}", normalize_channel(&self.channel)));
        lines
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("nick", &self.nick)
            .field("oauth_token", &"***")
            .field("channel", &self.channel)
            .field("owner", &self.owner)
            .field("capabilities", &self.capabilities)
            .field("reconnect", &self.reconnect)
            .field("rate_limit", &self.rate_limit)
            .field("elevated", &self.elevated)
            .field("connect_timeout", &self.connect_timeout)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("keepalive_idle", &self.keepalive_idle)
            .field("keepalive_timeout", &self.keepalive_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("#Gikkman", "GikkBot", "abc");
        assert_eq!(config.server, "irc.chat.twitch.tv");
        assert_eq!(config.port, 6697);
        assert!(config.tls);
        assert_eq!(config.channel, "gikkman");
        assert_eq!(config.nick, "gikkbot");
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.delay, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.handshake_timeout, Duration::from_secs(15));
        assert_eq!(config.keepalive_idle, Duration::from_secs(300));
        assert_eq!(config.effective_rate_limit(), RateLimit::DEFAULT);
    }

    #[test]
    fn test_login_sequence() {
        let config = ClientConfig::new("gikkman", "gikkbot", "abc");
        assert_eq!(
            config.login_sequence(),
            vec![
                "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership",
                "PASS oauth:abc",
                "NICK gikkbot",
                "JOIN #gikkman",
            ]
        );

        let config = config.with_capabilities(Vec::new());
        assert_eq!(config.login_sequence()[0], "PASS oauth:abc");
    }

    #[test]
    fn test_rate_limit_selection() {
        let config = ClientConfig::new("c", "n", "t").with_elevated(true);
        assert_eq!(config.effective_rate_limit(), RateLimit::ELEVATED);

        let custom = RateLimit::new(5, Duration::from_secs(1));
        assert_eq!(config.with_rate_limit(custom).effective_rate_limit(), custom);
    }

    #[test]
    fn test_debug_hides_token() {
        let config = ClientConfig::new("c", "n", "oauth:secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
    }
}
