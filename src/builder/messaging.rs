//! Builders for chat traffic: `PRIVMSG`, `WHISPER`, `JOIN`, `PART`, `NOTICE`.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::BuildError;
use crate::event::{ChatMessage, Membership, Notice, NoticeKind, TypedEvent, Whisper};
use crate::message::ParsedLine;

use super::{channel_name, required, sender, BuildContext};

const ACTION_PREFIX: &str = "\u{1}ACTION ";

/// `PRIVMSG` to a channel is a chat message; to the bot's own nick it is a
/// whisper. Any other target is not applicable.
pub fn privmsg(line: &ParsedLine, ctx: &BuildContext) -> Result<TypedEvent, BuildError> {
    let target = required(line, 0, "target")?;
    let text = required(line, 1, "text")?;

    if let Some(channel) = target.strip_prefix('#') {
        let (text, is_action) = unwrap_action(text);
        return Ok(TypedEvent::PrivateMessage(ChatMessage {
            channel: channel.to_string(),
            sender: sender(line, ctx),
            text,
            is_action,
            id: line.tag("id").map(str::to_string),
            bits: line.tag("bits").and_then(|b| b.parse().ok()).unwrap_or(0),
            sent_at: sent_at(line),
            raw: line.raw.clone(),
        }));
    }

    if !ctx.nick.is_empty() && target.eq_ignore_ascii_case(&ctx.nick) {
        return Ok(whisper_event(line, ctx, target, text));
    }

    Err(BuildError::not_applicable(
        &line.command,
        "target is neither a channel nor the bot",
    ))
}

/// `WHISPER <recipient> :<text>`.
pub fn whisper(line: &ParsedLine, ctx: &BuildContext) -> Result<TypedEvent, BuildError> {
    let recipient = required(line, 0, "recipient")?;
    let text = required(line, 1, "text")?;
    Ok(whisper_event(line, ctx, recipient, text))
}

fn whisper_event(line: &ParsedLine, ctx: &BuildContext, recipient: &str, text: &str) -> TypedEvent {
    TypedEvent::Whisper(Whisper {
        sender: sender(line, ctx),
        recipient: recipient.to_ascii_lowercase(),
        text: text.to_string(),
        id: line
            .tag("message-id")
            .or_else(|| line.tag("id"))
            .map(str::to_string),
        raw: line.raw.clone(),
    })
}

pub fn join(line: &ParsedLine, _ctx: &BuildContext) -> Result<TypedEvent, BuildError> {
    membership(line).map(TypedEvent::Join)
}

pub fn part(line: &ParsedLine, _ctx: &BuildContext) -> Result<TypedEvent, BuildError> {
    membership(line).map(TypedEvent::Part)
}

fn membership(line: &ParsedLine) -> Result<Membership, BuildError> {
    let channel = required(line, 0, "channel")?;
    let login = line
        .nick()
        .ok_or_else(|| BuildError::missing(&line.command, "prefix"))?;
    Ok(Membership {
        channel: channel_name(channel),
        login: login.to_ascii_lowercase(),
        raw: line.raw.clone(),
    })
}

/// `NOTICE <channel|*> :<message>`, classified by its `msg-id` tag.
pub fn notice(line: &ParsedLine, _ctx: &BuildContext) -> Result<TypedEvent, BuildError> {
    let target = required(line, 0, "target")?;
    let channel = match target {
        "*" => None,
        channel => Some(channel_name(channel)),
    };
    let message = if line.params.len() > 1 {
        line.trailing().unwrap_or_default().to_string()
    } else {
        String::new()
    };
    let kind = line
        .tag("msg-id")
        .map_or(NoticeKind::Unspecified, NoticeKind::from_msg_id);

    Ok(TypedEvent::Notice(Notice {
        channel,
        kind,
        message,
        raw: line.raw.clone(),
    }))
}

/// Strip CTCP `ACTION` framing. The closing `\x01` is optional because some
/// clients omit it.
fn unwrap_action(text: &str) -> (String, bool) {
    match text.strip_prefix(ACTION_PREFIX) {
        Some(inner) => (inner.strip_suffix('\u{1}').unwrap_or(inner).to_string(), true),
        None => (text.to_string(), false),
    }
}

fn sent_at(line: &ParsedLine) -> Option<DateTime<Utc>> {
    let millis = line.tag("tmi-sent-ts")?.parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}
