//! Decoding the user a tagged line was sent by.

use crate::event::user::{parse_badges, parse_color, parse_flag};
use crate::event::{TwitchUser, UserType};
use crate::message::ParsedLine;

use super::BuildContext;

/// Build the sender of a tagged line.
///
/// The login comes from the `login` tag (user notices) or the prefix nick
/// (chat messages, whispers). Missing tags fall back to defaults.
pub fn sender(line: &ParsedLine, ctx: &BuildContext) -> TwitchUser {
    let login = line
        .tag("login")
        .filter(|login| !login.is_empty())
        .or_else(|| line.nick())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let display_name = line
        .tag("display-name")
        .filter(|name| !name.is_empty())
        .map_or_else(|| login.clone(), str::to_string);
    let badges = parse_badges(line.tag("badges"));
    let has_badge = |name: &str| badges.iter().any(|badge| badge.name == name);

    let is_mod = parse_flag(line.tag("mod")) || has_badge("moderator");
    let is_subscriber =
        parse_flag(line.tag("subscriber")) || has_badge("subscriber") || has_badge("founder");
    let is_turbo = parse_flag(line.tag("turbo")) || has_badge("turbo");

    TwitchUser {
        user_type: UserType::classify(line.tag("user-type"), &login, &ctx.owner),
        user_id: line.tag("user-id").and_then(|id| id.parse().ok()),
        color: parse_color(line.tag("color")),
        login,
        display_name,
        badges,
        is_mod,
        is_subscriber,
        is_turbo,
    }
}
