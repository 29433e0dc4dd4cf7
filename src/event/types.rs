use std::time::Duration;

use chrono::{DateTime, Utc};

use super::user::{Badge, TwitchUser, UserType};

/// A message posted to a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChatMessage {
    /// Channel name without the leading `#`.
    pub channel: String,
    pub sender: TwitchUser,
    /// Message text, with any `/me` wrapping removed.
    pub text: String,
    /// Whether the message was sent with `/me`.
    pub is_action: bool,
    /// Twitch message id (`id` tag).
    pub id: Option<String>,
    /// Bits cheered with the message, 0 when none.
    pub bits: u32,
    /// Server timestamp (`tmi-sent-ts` tag).
    pub sent_at: Option<DateTime<Utc>>,
    pub raw: String,
}

/// A private message addressed to the bot.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Whisper {
    pub sender: TwitchUser,
    /// Login the whisper was addressed to.
    pub recipient: String,
    pub text: String,
    /// Whisper id (`message-id` tag).
    pub id: Option<String>,
    pub raw: String,
}

/// A user joining or leaving a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Membership {
    pub channel: String,
    pub login: String,
    pub raw: String,
}

/// Classification of a `NOTICE` by its `msg-id` tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NoticeKind {
    SubsOn,
    SubsOff,
    SlowOn,
    SlowOff,
    R9kOn,
    R9kOff,
    EmoteOnlyOn,
    EmoteOnlyOff,
    FollowersOn,
    FollowersOff,
    HostOn,
    HostOff,
    MsgBanned,
    MsgTimedOut,
    MsgChannelSuspended,
    /// A `msg-id` this crate does not name.
    Other(String),
    /// The notice had no `msg-id` tag.
    Unspecified,
}

impl NoticeKind {
    /// Map a `msg-id` tag value.
    pub fn from_msg_id(id: &str) -> Self {
        match id {
            "subs_on" => Self::SubsOn,
            "subs_off" => Self::SubsOff,
            "slow_on" => Self::SlowOn,
            "slow_off" => Self::SlowOff,
            "r9k_on" => Self::R9kOn,
            "r9k_off" => Self::R9kOff,
            "emote_only_on" => Self::EmoteOnlyOn,
            "emote_only_off" => Self::EmoteOnlyOff,
            "followers_on" | "followers_on_zero" => Self::FollowersOn,
            "followers_off" => Self::FollowersOff,
            "host_on" => Self::HostOn,
            "host_off" => Self::HostOff,
            "msg_banned" => Self::MsgBanned,
            "msg_timedout" => Self::MsgTimedOut,
            "msg_channel_suspended" => Self::MsgChannelSuspended,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A server notice.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Notice {
    /// Channel the notice refers to; `None` for global notices (`*`).
    pub channel: Option<String>,
    pub kind: NoticeKind,
    pub message: String,
    pub raw: String,
}

/// Whether a `HOSTTARGET` starts or stops hosting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HostMode {
    Start,
    Stop,
}

/// A channel started or stopped hosting another channel.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HostNotice {
    /// The hosting channel.
    pub channel: String,
    pub mode: HostMode,
    /// The hosted channel, `None` when hosting stopped.
    pub target: Option<String>,
    /// Viewer count sent along, 0 when absent.
    pub viewers: u32,
    pub raw: String,
}

/// Moderator status change reported through `MODE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModeEvent {
    GainedMod,
    LostMod,
}

/// A user gained or lost moderator status.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModeChange {
    pub channel: String,
    pub event: ModeEvent,
    /// Login of the affected user.
    pub user: String,
    pub raw: String,
}

/// The bot's own state in a channel (`USERSTATE`) or globally
/// (`GLOBALUSERSTATE`).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Userstate {
    /// `None` for `GLOBALUSERSTATE`.
    pub channel: Option<String>,
    pub display_name: String,
    pub color: u32,
    pub user_type: UserType,
    pub emote_sets: Vec<u64>,
    pub badges: Vec<Badge>,
    pub is_mod: bool,
    pub is_subscriber: bool,
    pub is_turbo: bool,
    pub raw: String,
}

/// Channel settings. Every setting is optional because Twitch sends partial
/// updates when a single setting changes.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Roomstate {
    pub channel: String,
    pub room_id: Option<u64>,
    pub broadcaster_lang: Option<String>,
    pub emote_only: Option<bool>,
    /// Minutes a user must follow before chatting; -1 when disabled.
    pub followers_only: Option<i64>,
    pub r9k: Option<bool>,
    /// Seconds between messages; 0 when disabled.
    pub slow: Option<u32>,
    pub subs_only: Option<bool>,
    pub raw: String,
}

/// What a `CLEARCHAT` cleared.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClearChatKind {
    /// The whole chat was cleared.
    Complete,
    /// A user was timed out.
    Timeout { target: String, duration: Duration },
    /// A user was banned.
    Ban { target: String },
}

/// A moderation action.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClearChat {
    pub channel: String,
    pub kind: ClearChatKind,
    /// `ban-reason` tag, when non-empty.
    pub reason: Option<String>,
    pub raw: String,
}

/// Classification of a `USERNOTICE` by its `msg-id` tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UsernoticeKind {
    Sub,
    Resub,
    SubGift,
    SubMysteryGift,
    Raid,
    Ritual,
    BitsBadgeTier,
    Announcement,
    Other(String),
}

impl UsernoticeKind {
    /// Map a `msg-id` tag value.
    pub fn from_msg_id(id: &str) -> Self {
        match id {
            "sub" => Self::Sub,
            "resub" => Self::Resub,
            "subgift" => Self::SubGift,
            "submysterygift" => Self::SubMysteryGift,
            "raid" => Self::Raid,
            "ritual" => Self::Ritual,
            "bitsbadgetier" => Self::BitsBadgeTier,
            "announcement" => Self::Announcement,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A system-generated chat event such as a subscription or a raid.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Usernotice {
    pub channel: String,
    pub kind: UsernoticeKind,
    /// The user the notice is about.
    pub sender: TwitchUser,
    /// Twitch's rendered description (`system-msg` tag).
    pub system_message: String,
    /// The user's own message, if they attached one.
    pub message: Option<String>,
    /// Cumulative subscription months, when relevant.
    pub months: Option<u32>,
    pub raw: String,
}
