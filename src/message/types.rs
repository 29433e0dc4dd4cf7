use std::fmt;
use std::str::FromStr;

use crate::error::TokenizeError;

use super::nom_parser::tokenize;
use super::tags::{format_tags, parse_tags, Tags};

/// One tokenized inbound line.
///
/// `command` is never empty: a line that does not contain at least a command
/// fails with [`TokenizeError`] instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedLine {
    /// Tag mapping, `None` when the line had no `@` section.
    pub tags: Option<Tags>,
    /// Server or user identity, without the leading `:`.
    pub prefix: Option<String>,
    /// Command token as sent; compare with [`ParsedLine::command_is`].
    pub command: String,
    /// Parameters in order; a trailing parameter is the last element.
    pub params: Vec<String>,
    /// The line as received, without its CRLF.
    pub raw: String,
}

impl ParsedLine {
    /// Tokenize one line. Trailing CR and LF characters are ignored.
    pub fn parse(line: &str) -> Result<Self, TokenizeError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let parts = tokenize(line)?;
        Ok(ParsedLine {
            tags: parts.tags.map(parse_tags),
            prefix: parts.prefix.map(str::to_string),
            command: parts.command.to_string(),
            params: parts.params.into_iter().map(str::to_string).collect(),
            raw: line.to_string(),
        })
    }

    /// Look up a tag value. Returns `None` if the tag (or the whole tag
    /// section) is absent.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.as_ref()?.get(key).map(String::as_str)
    }

    /// Whether the tag is present, even with an empty value.
    pub fn has_tag(&self, key: &str) -> bool {
        self.tag(key).is_some()
    }

    /// The nickname part of a `nick!user@host` prefix, or the whole prefix.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let nick = prefix.split(['!', '@']).next().unwrap_or(prefix);
        if nick.is_empty() {
            None
        } else {
            Some(nick)
        }
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The last parameter, which is where the trailing text ends up.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Case-insensitive command comparison.
    pub fn command_is(&self, name: &str) -> bool {
        self.command.eq_ignore_ascii_case(name)
    }
}

impl FromStr for ParsedLine {
    type Err = TokenizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParsedLine::parse(s)
    }
}

/// Serializes back to wire format. Tags are written in sorted key order and
/// the last parameter is always written as a trailing parameter.
impl fmt::Display for ParsedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tags) = &self.tags {
            write!(f, "@{} ", format_tags(tags))?;
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        f.write_str(&self.command)?;
        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                write!(f, " {}", param)?;
            }
            write!(f, " :{}", last)?;
        }
        Ok(())
    }
}
