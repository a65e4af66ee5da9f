//! Command-name derivation for PRIVMSG/NOTICE bodies.

use crate::event::TypedEvent;

/// Derive the command a message invokes, if any.
///
/// The first body word is lowercased. A word that starts with `prefix` has
/// it stripped; a word without it only counts when the message was sent to
/// the bot directly. Anything outside `a-z` becomes `_`, so `!foo-bar` and
/// `!foo_bar` both resolve to `foo_bar`.
pub fn command_name(event: &TypedEvent, prefix: &str) -> Option<String> {
    let first = event.body_fields.first()?.to_lowercase();
    let prefix = prefix.to_lowercase();

    let word = match first.strip_prefix(prefix.as_str()) {
        Some(rest) if !prefix.is_empty() => rest,
        _ if event.private => first.as_str(),
        _ => return None,
    };
    if word.is_empty() {
        return None;
    }

    Some(
        word.chars()
            .map(|c| if c.is_ascii_lowercase() { c } else { '_' })
            .collect(),
    )
}
