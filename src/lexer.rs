//! Lexical analysis of a single input line into a [`Command`].
//!
//! The grammar is intentionally flat: words are separated by runs of spaces or
//! newlines, `<` and `>` take the following word as a file name, and a lone
//! trailing `&` requests background execution. There is no quoting, globbing
//! or pipelining.

use crate::command::Command;
use thiserror::Error;

/// Default upper bound on the length of an input line, in bytes.
pub const DEFAULT_MAX_LINE_LEN: usize = 2048;

const INPUT_REDIRECT: &str = "<";
const OUTPUT_REDIRECT: &str = ">";
const BACKGROUND_MARKER: &str = "&";
const COMMENT_MARKER: char = '#';

/// Result of tokenizing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Nothing but separators; there is nothing to do.
    Blank,
    /// A command with a non-empty argument vector.
    Command(Command),
}

/// Errors that can occur while turning a line into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line exceeds the configured length limit.
    #[error("syntax error: line too long ({len} bytes, limit is {max})")]
    LineTooLong { len: usize, max: usize },
    /// A redirection operator was the last word on the line.
    #[error("syntax error: expected a file name after '{0}'")]
    MissingRedirectTarget(&'static str),
    /// Only redirections and/or the background marker were given.
    #[error("syntax error: missing command name")]
    MissingCommand,
}

/// Split a line into words on runs of spaces and newlines.
fn words(line: &str) -> impl Iterator<Item = &str> {
    line.split([' ', '\n']).filter(|w| !w.is_empty())
}

/// Tokenize a raw input line (trailing newline included or not).
///
/// # Arguments
/// * `line` - The text read from the user.
/// * `max_len` - Maximum accepted length of `line` in bytes.
///
/// # Returns
/// [`ParsedLine::Blank`] for an empty or whitespace-only line, otherwise the
/// parsed [`Command`]. A line whose first word starts with `#` is returned as a
/// command made of plain words, so redirection operators in comments are never
/// interpreted.
pub fn parse_line(line: &str, max_len: usize) -> Result<ParsedLine, ParseError> {
    if line.len() > max_len {
        return Err(ParseError::LineTooLong {
            len: line.len(),
            max: max_len,
        });
    }

    let mut tokens = words(line).peekable();
    match tokens.peek().copied() {
        None => return Ok(ParsedLine::Blank),
        Some(first) if first.starts_with(COMMENT_MARKER) => {
            return Ok(ParsedLine::Command(Command::new(tokens)));
        }
        Some(_) => {}
    }

    let mut command = Command::default();
    while let Some(token) = tokens.next() {
        match token {
            INPUT_REDIRECT => {
                let path = tokens
                    .next()
                    .ok_or(ParseError::MissingRedirectTarget(INPUT_REDIRECT))?;
                command.input = Some(path.to_string());
            }
            OUTPUT_REDIRECT => {
                let path = tokens
                    .next()
                    .ok_or(ParseError::MissingRedirectTarget(OUTPUT_REDIRECT))?;
                command.output = Some(path.to_string());
            }
            word => command.argv.push(word.to_string()),
        }
    }

    // Only a trailing `&` means background; anywhere else it is an argument.
    if command.argv.last().map(String::as_str) == Some(BACKGROUND_MARKER) {
        command.argv.pop();
        command.background = true;
    }

    if command.argv.is_empty() {
        return Err(ParseError::MissingCommand);
    }
    Ok(ParsedLine::Command(command))
}
