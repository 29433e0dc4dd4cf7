//! Builders for channel moderation and system events: `MODE`, `CLEARCHAT`,
//! `USERNOTICE`, `HOSTTARGET`.

use std::time::Duration;

use crate::error::BuildError;
use crate::event::{
    ClearChat, ClearChatKind, HostMode, HostNotice, ModeChange, ModeEvent, TypedEvent, Usernotice,
    UsernoticeKind,
};
use crate::message::ParsedLine;

use super::{channel_name, required, sender, BuildContext};

/// `MODE #channel (+o|-o) user`. Other flags are not applicable.
pub fn mode(line: &ParsedLine, _ctx: &BuildContext) -> Result<TypedEvent, BuildError> {
    let channel = required(line, 0, "channel")?;
    let flag = required(line, 1, "flag")?;
    let user = required(line, 2, "user")?;

    let event = match flag {
        "+o" => ModeEvent::GainedMod,
        "-o" => ModeEvent::LostMod,
        other => return Err(BuildError::invalid(&line.command, "flag", other)),
    };

    Ok(TypedEvent::ModeChange(ModeChange {
        channel: channel_name(channel),
        event,
        user: user.to_string(),
        raw: line.raw.clone(),
    }))
}

/// `CLEARCHAT #channel [:user]`. A `ban-duration` tag makes it a timeout.
pub fn clearchat(line: &ParsedLine, _ctx: &BuildContext) -> Result<TypedEvent, BuildError> {
    let channel = channel_name(required(line, 0, "channel")?);

    let kind = match line.param(1).filter(|target| !target.is_empty()) {
        None => ClearChatKind::Complete,
        Some(target) => {
            let target = target.to_string();
            match line.tag("ban-duration").and_then(|d| d.parse::<u64>().ok()) {
                Some(secs) => ClearChatKind::Timeout {
                    target,
                    duration: Duration::from_secs(secs),
                },
                None => ClearChatKind::Ban { target },
            }
        }
    };

    Ok(TypedEvent::ClearChat(ClearChat {
        channel,
        kind,
        reason: line
            .tag("ban-reason")
            .filter(|reason| !reason.is_empty())
            .map(str::to_string),
        raw: line.raw.clone(),
    }))
}

/// `USERNOTICE #channel [:message]`, classified by `msg-id`.
pub fn usernotice(line: &ParsedLine, ctx: &BuildContext) -> Result<TypedEvent, BuildError> {
    let channel = channel_name(required(line, 0, "channel")?);
    let kind = UsernoticeKind::from_msg_id(line.tag("msg-id").unwrap_or_default());
    let message = if line.params.len() > 1 {
        line.trailing().map(str::to_string)
    } else {
        None
    };
    let months = line
        .tag("msg-param-cumulative-months")
        .or_else(|| line.tag("msg-param-months"))
        .and_then(|m| m.parse().ok());

    Ok(TypedEvent::Usernotice(Usernotice {
        channel,
        kind,
        sender: sender(line, ctx),
        system_message: line.tag("system-msg").unwrap_or_default().to_string(),
        message,
        months,
        raw: line.raw.clone(),
    }))
}

/// `HOSTTARGET #host :<target|-> [viewers]`.
pub fn hosttarget(line: &ParsedLine, _ctx: &BuildContext) -> Result<TypedEvent, BuildError> {
    let channel = channel_name(required(line, 0, "channel")?);
    let body = required(line, 1, "target")?;

    let mut words = body.split_whitespace();
    let (mode, target) = match words.next() {
        None | Some("-") => (HostMode::Stop, None),
        Some(target) => (HostMode::Start, Some(channel_name(target))),
    };
    let viewers = words.next().and_then(|v| v.parse().ok()).unwrap_or(0);

    Ok(TypedEvent::HostNotice(HostNotice {
        channel,
        mode,
        target,
        viewers,
        raw: line.raw.clone(),
    }))
}
