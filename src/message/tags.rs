//! IRCv3 message tag parsing and escaping.
//!
//! Twitch attaches most of its metadata (colors, badges, user ids, ban
//! durations) as tags, so every inbound line with an `@` section goes
//! through [`parse_tags`].

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{self, Write};

/// Tag mapping of a parsed line. Order is not preserved.
pub type Tags = HashMap<String, String>;

fn escape_char(c: char) -> Option<&'static str> {
    match c {
        ';' => Some("\\:"),
        ' ' => Some("\\s"),
        '\\' => Some("\\\\"),
        '\r' => Some("\\r"),
        '\n' => Some("\\n"),
        _ => None,
    }
}

fn unescape_char(c: char) -> char {
    match c {
        ':' => ';',
        's' => ' ',
        'r' => '\r',
        'n' => '\n',
        other => other,
    }
}

/// Write `value` in tag wire format, escaping `;`, space, `\`, CR and LF.
///
/// Unescaped runs are written in one piece.
pub fn escape_tag_value<W: Write + ?Sized>(out: &mut W, value: &str) -> fmt::Result {
    let mut run = 0;
    for (idx, c) in value.char_indices() {
        if let Some(escaped) = escape_char(c) {
            out.write_str(&value[run..idx])?;
            out.write_str(escaped)?;
            run = idx + c.len_utf8();
        }
    }
    out.write_str(&value[run..])
}

/// Decode a tag value from wire format.
///
/// Borrows when there is nothing to decode. An unknown escape yields the
/// escaped character itself; a dangling backslash is dropped.
pub fn unescape_tag_value(value: &str) -> Cow<'_, str> {
    let Some(first) = value.find('\\') else {
        return Cow::Borrowed(value);
    };
    let mut out = String::with_capacity(value.len());
    out.push_str(&value[..first]);
    let mut chars = value[first..].chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
        } else if let Some(escaped) = chars.next() {
            out.push(unescape_char(escaped));
        }
    }
    Cow::Owned(out)
}

/// Split a raw tag section (without the leading `@`) into a mapping.
///
/// Pieces are separated by `;` and split on the first `=`. A key without
/// `=` maps to the empty string; empty pieces are skipped. When a key
/// repeats, the last value wins.
pub fn parse_tags(raw: &str) -> Tags {
    raw.split(';')
        .filter(|piece| !piece.is_empty())
        .filter_map(|piece| {
            let (key, value) = match piece.split_once('=') {
                Some((key, value)) => (key, value),
                None => (piece, ""),
            };
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unescape_tag_value(value).into_owned()))
        })
        .collect()
}

/// Render a tag mapping back into wire format (without the leading `@`).
///
/// Keys are emitted in sorted order so the output is deterministic.
pub fn format_tags(tags: &Tags) -> String {
    let mut keys: Vec<&String> = tags.keys().collect();
    keys.sort();

    let mut out = String::new();
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        out.push_str(key);
        out.push('=');
        // Writing into a String cannot fail.
        let _ = escape_tag_value(&mut out, &tags[key]);
    }
    out
}
