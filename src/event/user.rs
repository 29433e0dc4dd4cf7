//! Twitch user model and the lenient tag decoders shared by the builders.

/// Classification of a chat user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UserType {
    /// The configured owner of the bot.
    Owner,
    /// Channel moderator.
    Mod,
    /// Twitch global moderator.
    GlobalMod,
    /// Twitch administrator.
    Admin,
    /// Twitch staff.
    Staff,
    /// Everybody else.
    #[default]
    Default,
}

impl UserType {
    /// Map a `user-type` tag value. Unknown and empty values are `Default`.
    pub fn from_tag(value: &str) -> Self {
        match value {
            "mod" => Self::Mod,
            "global_mod" => Self::GlobalMod,
            "admin" => Self::Admin,
            "staff" => Self::Staff,
            _ => Self::Default,
        }
    }

    /// Classify a user: the owner login wins over whatever the tag says.
    ///
    /// The login comparison ignores ASCII case; an empty owner login never
    /// matches.
    pub fn classify(tag: Option<&str>, login: &str, owner: &str) -> Self {
        if !owner.is_empty() && login.eq_ignore_ascii_case(owner) {
            return Self::Owner;
        }
        tag.map(Self::from_tag).unwrap_or_default()
    }

    /// Owners, moderators and Twitch personnel.
    pub fn is_privileged(self) -> bool {
        !matches!(self, Self::Default)
    }
}

/// A chat badge such as `subscriber/12`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Badge {
    /// Badge name, e.g. `broadcaster`.
    pub name: String,
    /// Badge version, e.g. `1`.
    pub version: String,
}

/// The sender of a chat message, whisper or user notice.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TwitchUser {
    /// Lowercase login name.
    pub login: String,
    /// Display name, falling back to the login when the tag is empty.
    pub display_name: String,
    /// Numeric user id, when tagged.
    pub user_id: Option<u64>,
    /// RGB color, 0 when unset.
    pub color: u32,
    pub user_type: UserType,
    pub badges: Vec<Badge>,
    pub is_mod: bool,
    pub is_subscriber: bool,
    pub is_turbo: bool,
}

impl TwitchUser {
    /// Whether the user carries a badge with this name.
    pub fn has_badge(&self, name: &str) -> bool {
        self.badges.iter().any(|badge| badge.name == name)
    }
}

/// Decode a `color` tag.
///
/// Accepts `0x1234`, `#RRGGBB` and bare hex digits. Anything absent,
/// empty or unparseable decodes to 0 rather than failing.
pub fn parse_color(value: Option<&str>) -> u32 {
    let Some(value) = value.map(str::trim) else {
        return 0;
    };
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .or_else(|| value.strip_prefix('#'))
        .unwrap_or(value);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return 0;
    }
    u32::from_str_radix(digits, 16).unwrap_or(0)
}

/// Decode an `emote-sets` tag.
///
/// An absent tag means the default set `[0]`; an empty value means no sets.
/// Entries that are not integers are skipped.
pub fn parse_emote_sets(value: Option<&str>) -> Vec<u64> {
    match value {
        None => vec![0],
        Some(value) => value
            .split(',')
            .filter_map(|set| set.trim().parse().ok())
            .collect(),
    }
}

/// Decode a `badges` tag like `broadcaster/1,subscriber/12`.
pub fn parse_badges(value: Option<&str>) -> Vec<Badge> {
    value
        .unwrap_or_default()
        .split(',')
        .filter(|badge| !badge.is_empty())
        .map(|badge| match badge.split_once('/') {
            Some((name, version)) => Badge {
                name: name.to_string(),
                version: version.to_string(),
            },
            None => Badge {
                name: badge.to_string(),
                version: String::new(),
            },
        })
        .collect()
}

/// Decode a `0`/`1` flag tag.
pub fn parse_flag(value: Option<&str>) -> bool {
    value == Some("1")
}
