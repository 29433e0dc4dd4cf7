//! Twitch IRCv3 capabilities.
//!
//! Twitch only sends tags, its own commands (`USERSTATE`, `CLEARCHAT`, ...)
//! and membership traffic (`JOIN`/`PART`/`MODE`) to clients that request the
//! matching capability before logging in.
//!
//! # Reference
//! - <https://dev.twitch.tv/docs/irc/capabilities/>

use std::fmt;

/// A capability requested with `CAP REQ`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `twitch.tv/tags`: metadata tags on messages
    Tags,
    /// `twitch.tv/commands`: Twitch-specific commands
    Commands,
    /// `twitch.tv/membership`: JOIN, PART and MODE traffic
    Membership,
    /// Any other capability
    Custom(String),
}

impl Capability {
    /// The capabilities requested by default.
    pub const DEFAULT: [Capability; 3] = [Self::Tags, Self::Commands, Self::Membership];
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        match self {
            Self::Tags => "twitch.tv/tags",
            Self::Commands => "twitch.tv/commands",
            Self::Membership => "twitch.tv/membership",
            Self::Custom(s) => s,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        match s {
            "twitch.tv/tags" => Self::Tags,
            "twitch.tv/commands" => Self::Commands,
            "twitch.tv/membership" => Self::Membership,
            other => Self::Custom(other.to_string()),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Capability {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_ref())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Capability {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        Ok(Capability::from(name.as_ref()))
    }
}

/// The `CAP REQ` line for `caps`, or `None` when there is nothing to request.
pub fn cap_req(caps: &[Capability]) -> Option<String> {
    if caps.is_empty() {
        return None;
    }
    let names: Vec<&str> = caps.iter().map(AsRef::as_ref).collect();
    Some(format!("CAP REQ :{}", names.join(" ")))
}
