//! Builders for `USERSTATE`, `GLOBALUSERSTATE` and `ROOMSTATE`.

use crate::error::BuildError;
use crate::event::user::{parse_badges, parse_color, parse_emote_sets, parse_flag};
use crate::event::{Roomstate, TypedEvent, UserType, Userstate};
use crate::message::ParsedLine;

use super::{channel_name, required, BuildContext};

/// Bot state in a channel, or globally for `GLOBALUSERSTATE`.
///
/// Owner detection compares the display name against the configured owner,
/// falling back to the bot's nick when the display name is empty.
pub fn userstate(line: &ParsedLine, ctx: &BuildContext) -> Result<TypedEvent, BuildError> {
    let channel = if line.command_is("GLOBALUSERSTATE") {
        None
    } else {
        Some(channel_name(required(line, 0, "channel")?))
    };

    let display_name = line.tag("display-name").unwrap_or_default().to_string();
    let login = if display_name.is_empty() {
        ctx.nick.as_str()
    } else {
        display_name.as_str()
    };
    let user_type = UserType::classify(line.tag("user-type"), login, &ctx.owner);
    let badges = parse_badges(line.tag("badges"));
    let has_badge = |name: &str| badges.iter().any(|badge| badge.name == name);
    let is_mod = parse_flag(line.tag("mod")) || has_badge("moderator");
    let is_subscriber = parse_flag(line.tag("subscriber")) || has_badge("subscriber");
    let is_turbo = parse_flag(line.tag("turbo")) || has_badge("turbo");

    Ok(TypedEvent::Userstate(Userstate {
        channel,
        color: parse_color(line.tag("color")),
        user_type,
        emote_sets: parse_emote_sets(line.tag("emote-sets")),
        is_mod,
        is_subscriber,
        is_turbo,
        badges,
        display_name,
        raw: line.raw.clone(),
    }))
}

/// Channel settings. Absent tags stay `None`; unparseable numbers too.
pub fn roomstate(line: &ParsedLine, _ctx: &BuildContext) -> Result<TypedEvent, BuildError> {
    let channel = channel_name(required(line, 0, "channel")?);
    let toggle = |key: &str| line.tag(key).map(|value| value == "1");

    Ok(TypedEvent::Roomstate(Roomstate {
        channel,
        room_id: line.tag("room-id").and_then(|id| id.parse().ok()),
        broadcaster_lang: line.tag("broadcaster-lang").map(str::to_string),
        emote_only: toggle("emote-only"),
        followers_only: line.tag("followers-only").and_then(|v| v.parse().ok()),
        r9k: toggle("r9k"),
        slow: line.tag("slow").and_then(|v| v.parse().ok()),
        subs_only: toggle("subs-only"),
        raw: line.raw.clone(),
    }))
}
