//! Helpers for building outbound Twitch lines.

/// Longest chat message Twitch accepts, in characters.
pub const MAX_CHAT_MESSAGE_CHARS: usize = 500;

/// Truncates a string to at most `max_chars` characters.
///
/// Counts Unicode codepoints rather than bytes, which is how Twitch counts
/// its message limit.
///
/// # Examples
///
/// ```
/// use twirc::util::truncate_chars;
///
/// assert_eq!(truncate_chars("hello", 3), "hel");
/// assert_eq!(truncate_chars("héllo", 3), "hél");
/// assert_eq!(truncate_chars("👋🌍🚀", 2), "👋🌍");
/// ```
#[inline]
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Lowercase channel name without the leading `#`.
pub fn normalize_channel(channel: &str) -> String {
    let channel = channel.trim();
    channel
        .strip_prefix('#')
        .unwrap_or(channel)
        .to_ascii_lowercase()
}

/// OAuth token in the form `PASS` expects, adding the `oauth:` prefix when
/// it is missing.
pub fn pass_token(token: &str) -> String {
    let token = token.trim();
    if token.starts_with("oauth:") {
        token.to_string()
    } else {
        format!("oauth:{token}")
    }
}

/// `PRIVMSG #channel :text`, with the text cut to Twitch's message limit.
pub fn chat_line(channel: &str, text: &str) -> String {
    format!(
        "PRIVMSG #{} :{}",
        normalize_channel(channel),
        truncate_chars(text, MAX_CHAT_MESSAGE_CHARS)
    )
}

/// Whisper to `user`, sent as the `/w` chat command.
pub fn whisper_line(user: &str, text: &str) -> String {
    let user = user.trim().to_ascii_lowercase();
    let budget = MAX_CHAT_MESSAGE_CHARS.saturating_sub(user.chars().count() + 4);
    format!("PRIVMSG #jtv :/w {} {}", user, truncate_chars(text, budget))
}
