//! Operator console — queues commands typed on stdin.
//!
//! One command per line: `<serial> <channel> <payload...>`. The payload is
//! sent to the gateway verbatim and may contain spaces.

/// A command line split into its parts.
#[derive(Debug, PartialEq, Eq)]
pub struct ConsoleCommand<'a> {
    pub serial: &'a str,
    pub channel: &'a str,
    pub payload: &'a str,
}

/// Split a console line. Blank lines and `#` comments yield `None`, as do
/// lines missing a part.
#[must_use]
pub fn parse(line: &str) -> Option<ConsoleCommand<'_>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (serial, rest) = line.split_once(char::is_whitespace)?;
    let (channel, payload) = rest.trim_start().split_once(char::is_whitespace)?;
    let payload = payload.trim();
    if payload.is_empty() {
        return None;
    }
    Some(ConsoleCommand {
        serial,
        channel,
        payload,
    })
}
