//! Nom-based line tokenizer.
//!
//! Splits one line (already stripped of its CRLF) into borrowed tag, prefix,
//! command and parameter slices. Building owned values is left to
//! [`ParsedLine`](super::ParsedLine).

use nom::{
    bytes::complete::{take_till, take_till1, take_while},
    character::complete::char,
    combinator::{opt, verify},
    error::{context, VerboseError},
    sequence::preceded,
    IResult,
};

use crate::error::TokenizeError;

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

fn is_space(c: char) -> bool {
    c == ' '
}

fn spaces(input: &str) -> ParseResult<&str, &str> {
    take_while(is_space)(input)
}

/// `@` followed by the raw tag section, which runs up to the first space.
fn tag_section(input: &str) -> ParseResult<&str, &str> {
    context(
        "tag section",
        preceded(char('@'), take_till(is_space)),
    )(input)
}

/// `:` followed by a non-empty source such as `nick!nick@nick.tmi.twitch.tv`.
fn source(input: &str) -> ParseResult<&str, &str> {
    context(
        "source",
        preceded(char(':'), take_till1(is_space)),
    )(input)
}

/// Command token. A stray `:` cannot start a command.
fn command(input: &str) -> ParseResult<&str, &str> {
    context(
        "command",
        verify(take_till1(is_space), |token: &str| !token.starts_with(':')),
    )(input)
}

/// Split the parameter section into middle parameters and an optional
/// trailing parameter. Runs of spaces count as one delimiter.
fn split_params(mut rest: &str) -> Vec<&str> {
    let mut params = Vec::new();
    loop {
        let trimmed = rest.trim_start_matches(' ');
        if trimmed.is_empty() {
            break;
        }
        if let Some(trailing) = trimmed.strip_prefix(':') {
            params.push(trailing);
            break;
        }
        let end = trimmed.find(' ').unwrap_or(trimmed.len());
        params.push(&trimmed[..end]);
        rest = &trimmed[end..];
    }
    params
}

/// Borrowed pieces of one tokenized line.
///
/// ```text
/// [@tags] [:prefix] <command> [params...] [:trailing]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineParts<'a> {
    /// Escaped tag section, `@` stripped.
    pub tags: Option<&'a str>,
    /// Source of the line, `:` stripped.
    pub prefix: Option<&'a str>,
    /// The command token as it appeared on the wire.
    pub command: &'a str,
    /// Parameters, the trailing one last and without its colon.
    pub params: Vec<&'a str>,
}

fn parse_line(input: &str) -> ParseResult<&str, LineParts<'_>> {
    let (input, _) = spaces(input)?;
    let (input, tags) = opt(tag_section)(input)?;
    let (input, _) = spaces(input)?;
    let (input, prefix) = opt(source)(input)?;
    let (input, _) = spaces(input)?;
    let (input, command) = command(input)?;

    let params = split_params(input);
    Ok((
        "",
        LineParts {
            tags,
            prefix,
            command,
            params,
        },
    ))
}

/// Tokenize a line that has no CR or LF left in it.
pub fn tokenize(line: &str) -> Result<LineParts<'_>, TokenizeError> {
    if line.trim_matches(' ').is_empty() {
        return Err(TokenizeError::EmptyLine);
    }
    match parse_line(line) {
        Ok((_, parts)) => Ok(parts),
        Err(_) => Err(TokenizeError::MissingCommand),
    }
}
