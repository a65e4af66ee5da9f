use super::{EventKind, TypedEvent};
use crate::isupport::NetworkCapabilities;
use crate::proto::{Identity, ctcp, numeric};
use chrono::Utc;
use tracing::debug;

/// Turn a raw inbound line into a [`TypedEvent`].
///
/// `caps` decides which destinations are channels, which in turn decides the
/// reply target.
pub fn classify(raw_line: &str, caps: &NetworkCapabilities) -> TypedEvent {
    let raw = raw_line.strip_prefix(':').unwrap_or(raw_line);
    let raw_fields: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    let command = raw_fields.get(1).map(String::as_str).unwrap_or("");

    let mut kind = kind_for(command);
    let mut ctcp_payload = None;

    if matches!(kind, EventKind::PrivateMessage | EventKind::Notice) {
        if let Some(payload) = ctcp::find_frame(raw) {
            ctcp_payload = Some(payload);
            kind = if kind == EventKind::PrivateMessage {
                EventKind::CtcpRequest
            } else {
                EventKind::CtcpReply
            };
        } else if ctcp::has_stray_delimiter(raw) {
            debug!(line = %raw, "Unterminated CTCP delimiter, treating as plain text");
        }
    }

    let trailing = trailing_text(raw);
    let body = match (kind, ctcp_payload) {
        (_, Some(payload)) => payload.to_string(),
        (EventKind::JoinChannel | EventKind::PartChannel, _) => {
            trailing.unwrap_or_default().to_string()
        }
        _ => trailing.unwrap_or(raw).to_string(),
    };
    let body_fields: Vec<String> = body.split_whitespace().map(str::to_string).collect();
    let args = body_fields
        .get(1..)
        .map(|rest| rest.join(" "))
        .unwrap_or_default();

    let speaker = raw_fields
        .first()
        .map(|token| Identity::parse(token))
        .unwrap_or_default();
    let destination = raw_fields.get(2).cloned().unwrap_or_default();

    let target = destination.trim_start_matches(':');
    let private = !caps.is_channel(target);
    let reply_target = if private {
        speaker.nick.clone()
    } else {
        target.to_string()
    };

    TypedEvent {
        kind,
        raw: raw.to_string(),
        raw_fields,
        body,
        body_fields,
        args,
        speaker,
        destination,
        reply_target,
        private,
        caps_revision: caps.revision(),
        timestamp: Utc::now(),
    }
}

fn kind_for(command: &str) -> EventKind {
    match command {
        "PRIVMSG" => EventKind::PrivateMessage,
        "NOTICE" => EventKind::Notice,
        "NICK" => EventKind::NickChange,
        "JOIN" => EventKind::JoinChannel,
        "PART" => EventKind::PartChannel,
        "MODE" => EventKind::ModeChange,
        numeric::RPL_CHANNELMODEIS => EventKind::ChannelModesReply,
        numeric::RPL_TOPIC => EventKind::ChannelTopicReply,
        numeric::RPL_WHOREPLY => EventKind::WhoReply,
        numeric::RPL_INVITELIST => EventKind::InviteExemptListReply,
        numeric::RPL_EXCEPTLIST => EventKind::BanExemptListReply,
        numeric::RPL_BANLIST => EventKind::BanListReply,
        _ => EventKind::ServerMessage,
    }
}

/// Text after the first `:` that follows the prefix token.
///
/// The prefix itself is skipped so that IPv6 hosts (`nick!u@2001:db8::1`)
/// are not mistaken for the start of the trailing parameter.
fn trailing_text(raw: &str) -> Option<&str> {
    let start = raw.find(char::is_whitespace)?;
    let rest = &raw[start..];
    rest.find(':').map(|idx| &rest[idx + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> NetworkCapabilities {
        NetworkCapabilities::default()
    }

    #[test]
    fn reclassify_follows_new_channel_types() {
        let mut caps = caps();
        let ev = classify(":a!u@h PRIVMSG !chan :hello", &caps);
        assert!(ev.private);
        assert_eq!(ev.reply_target, "a");

        caps.apply_isupport_line(&["srv", "005", "bot", "CHANTYPES=#!", ":are"]);
        assert_ne!(ev.caps_revision, caps.revision());
        let again = ev.reclassify(&caps);
        assert!(!again.private);
        assert_eq!(again.reply_target, "!chan");
        assert_eq!(again.raw, ev.raw);
        assert_eq!(again.timestamp, ev.timestamp);
        assert_eq!(again.caps_revision, caps.revision());
    }

    #[test]
    fn channel_privmsg() {
        let ev = classify(":alice!a@host PRIVMSG #rust :!seen bob now", &caps());
        assert_eq!(ev.kind, EventKind::PrivateMessage);
        assert_eq!(ev.raw, "alice!a@host PRIVMSG #rust :!seen bob now");
        assert_eq!(ev.body, "!seen bob now");
        assert_eq!(ev.body_fields, vec!["!seen", "bob", "now"]);
        assert_eq!(ev.args, "bob now");
        assert_eq!(ev.speaker, Identity::new("alice", "a", "host"));
        assert_eq!(ev.destination, "#rust");
        assert_eq!(ev.reply_target, "#rust");
        assert!(!ev.private);
        assert_eq!(ev.command(), "PRIVMSG");
    }

    #[test]
    fn private_privmsg_replies_to_speaker() {
        let ev = classify(":alice!a@host PRIVMSG bot :hello", &caps());
        assert_eq!(ev.reply_target, "alice");
        assert!(ev.private);
        assert_eq!(ev.args, "");
    }

    #[test]
    fn ctcp_request_and_reply() {
        let ev = classify(":alice!a@host PRIVMSG bot :\x01VERSION\x01", &caps());
        assert_eq!(ev.kind, EventKind::CtcpRequest);
        assert_eq!(ev.body, "VERSION");
        assert_eq!(ev.ctcp(), Some(("VERSION", None)));

        let ev = classify(":alice!a@host NOTICE bot :\x01PING 1234\x01", &caps());
        assert_eq!(ev.kind, EventKind::CtcpReply);
        assert_eq!(ev.body, "PING 1234");
        assert_eq!(ev.args, "1234");
    }

    #[test]
    fn stray_delimiter_stays_plain() {
        let ev = classify(":alice!a@host PRIVMSG #c :\x01ACTION waves", &caps());
        assert_eq!(ev.kind, EventKind::PrivateMessage);
        assert_eq!(ev.body, "\x01ACTION waves");
    }

    #[test]
    fn join_without_colon_has_empty_body() {
        let ev = classify(":alice!a@host JOIN #rust", &caps());
        assert_eq!(ev.kind, EventKind::JoinChannel);
        assert_eq!(ev.body, "");
        assert_eq!(ev.destination, "#rust");

        let ev = classify(":alice!a@host JOIN :#rust", &caps());
        assert_eq!(ev.body, "#rust");
        assert_eq!(ev.reply_target, "#rust");
    }

    #[test]
    fn server_message_body_defaults_to_line() {
        let ev = classify(":irc.example.net 376 bot", &caps());
        assert_eq!(ev.kind, EventKind::ServerMessage);
        assert_eq!(ev.body, "irc.example.net 376 bot");
        assert_eq!(ev.speaker.nick, "irc.example.net");
    }

    #[test]
    fn numeric_kinds() {
        let c = caps();
        assert_eq!(classify(":s 324 bot #c +nt", &c).kind, EventKind::ChannelModesReply);
        assert_eq!(classify(":s 332 bot #c :topic", &c).kind, EventKind::ChannelTopicReply);
        assert_eq!(classify(":s 352 bot #c u h s n H :0 r", &c).kind, EventKind::WhoReply);
        assert_eq!(classify(":s 346 bot #c *!*@x", &c).kind, EventKind::InviteExemptListReply);
        assert_eq!(classify(":s 348 bot #c *!*@x", &c).kind, EventKind::BanExemptListReply);
        assert_eq!(classify(":s 367 bot #c *!*@x", &c).kind, EventKind::BanListReply);
        assert_eq!(classify(":n!u@h MODE #c +o x", &c).kind, EventKind::ModeChange);
        assert_eq!(classify(":n!u@h NICK :m", &c).kind, EventKind::NickChange);
        assert_eq!(classify(":n!u@h PART #c :bye", &c).kind, EventKind::PartChannel);
    }

    #[test]
    fn ipv6_prefix_does_not_split_body() {
        let ev = classify(":alice!a@2001:db8::1 PRIVMSG #c :hi there", &caps());
        assert_eq!(ev.body, "hi there");
        assert_eq!(ev.speaker.host, "2001:db8::1");
    }

    #[test]
    fn malformed_lines_yield_empty_fields() {
        let ev = classify("", &caps());
        assert_eq!(ev.kind, EventKind::ServerMessage);
        assert!(ev.raw_fields.is_empty());
        assert_eq!(ev.destination, "");
        assert_eq!(ev.command(), "");

        let ev = classify(":", &caps());
        assert_eq!(ev.raw, "");
        assert_eq!(ev.speaker, Identity::default());
    }

    #[test]
    fn chantypes_drive_reply_target() {
        let mut c = caps();
        c.apply_isupport_line(&["s", "005", "bot", "CHANTYPES=!"]);
        let ev = classify(":a!b@c PRIVMSG #rust :hi", &c);
        assert!(ev.private);
        assert_eq!(ev.reply_target, "a");
        let ev = classify(":a!b@c PRIVMSG !rust :hi", &c);
        assert_eq!(ev.reply_target, "!rust");
    }
}
