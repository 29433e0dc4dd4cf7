//! Typed events produced from inbound lines.
//!
//! Every inbound line (except keep-alive traffic) becomes exactly one
//! [`TypedEvent`]. Lines nobody knows how to build end up as
//! [`TypedEvent::Unknown`], never as an error.

mod types;
pub mod user;

pub use self::types::{
    ChatMessage, ClearChat, ClearChatKind, HostMode, HostNotice, Membership, ModeChange,
    ModeEvent, Notice, NoticeKind, Roomstate, Usernotice, UsernoticeKind, Userstate, Whisper,
};
pub use self::user::{Badge, TwitchUser, UserType};

/// One decoded inbound line.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypedEvent {
    PrivateMessage(ChatMessage),
    Whisper(Whisper),
    Join(Membership),
    Part(Membership),
    Notice(Notice),
    HostNotice(HostNotice),
    ModeChange(ModeChange),
    Userstate(Userstate),
    Roomstate(Roomstate),
    ClearChat(ClearChat),
    Usernotice(Usernotice),
    /// The server asked us to reconnect.
    ReconnectRequest,
    /// No builder produced an event; carries the raw line.
    Unknown(String),
}

impl TypedEvent {
    /// Short variant name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PrivateMessage(_) => "PrivateMessage",
            Self::Whisper(_) => "Whisper",
            Self::Join(_) => "Join",
            Self::Part(_) => "Part",
            Self::Notice(_) => "Notice",
            Self::HostNotice(_) => "HostNotice",
            Self::ModeChange(_) => "ModeChange",
            Self::Userstate(_) => "Userstate",
            Self::Roomstate(_) => "Roomstate",
            Self::ClearChat(_) => "ClearChat",
            Self::Usernotice(_) => "Usernotice",
            Self::ReconnectRequest => "ReconnectRequest",
            Self::Unknown(_) => "Unknown",
        }
    }

    /// The raw line the event was built from, if the variant keeps it.
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::PrivateMessage(e) => Some(&e.raw),
            Self::Whisper(e) => Some(&e.raw),
            Self::Join(e) | Self::Part(e) => Some(&e.raw),
            Self::Notice(e) => Some(&e.raw),
            Self::HostNotice(e) => Some(&e.raw),
            Self::ModeChange(e) => Some(&e.raw),
            Self::Userstate(e) => Some(&e.raw),
            Self::Roomstate(e) => Some(&e.raw),
            Self::ClearChat(e) => Some(&e.raw),
            Self::Usernotice(e) => Some(&e.raw),
            Self::ReconnectRequest => None,
            Self::Unknown(raw) => Some(raw),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}
