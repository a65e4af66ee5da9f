//! CTCP (Client-to-Client Protocol) framing.
//!
//! CTCP payloads ride inside PRIVMSG (requests) and NOTICE (replies),
//! wrapped in the `\x01` delimiter byte on both sides.

/// The CTCP delimiter byte.
pub const DELIM: char = '\x01';

/// Locate a CTCP frame inside a message line.
///
/// A frame is an opening delimiter followed by at least one non-space
/// character and a closing delimiter later on the line. Returns the text
/// between the delimiters.
pub fn find_frame(text: &str) -> Option<&str> {
    let open = text.find(DELIM)?;
    let inner = &text[open + 1..];
    let close = inner.find(DELIM)?;
    let payload = &inner[..close];

    match payload.chars().next() {
        Some(c) if c != ' ' => Some(payload),
        _ => None,
    }
}

/// Whether the text contains a delimiter that does not form a frame.
pub fn has_stray_delimiter(text: &str) -> bool {
    text.contains(DELIM) && find_frame(text).is_none()
}

/// Split a payload into its command and optional parameters.
pub fn split_payload(payload: &str) -> (&str, Option<&str>) {
    match payload.split_once(' ') {
        Some((command, params)) if !params.is_empty() => (command, Some(params)),
        Some((command, _)) => (command, None),
        None => (payload, None),
    }
}

/// Wrap a payload for sending.
pub fn frame(command: &str, params: Option<&str>) -> String {
    match params {
        Some(params) => format!("{DELIM}{command} {params}{DELIM}"),
        None => format!("{DELIM}{command}{DELIM}"),
    }
}
