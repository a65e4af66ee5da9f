//! Typed inbound events.
//!
//! Every line the reader hands to a worker is turned into a [`TypedEvent`] by
//! [`classify`]. Classification never fails: a malformed line still yields an
//! event, just with empty fields.

mod classify;

pub use classify::classify;

use crate::isupport::NetworkCapabilities;
use crate::proto::Identity;
use chrono::{DateTime, Utc};
use std::fmt;

/// Closed set of event kinds the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ServerMessage,
    PrivateMessage,
    Notice,
    CtcpRequest,
    CtcpReply,
    NickChange,
    JoinChannel,
    PartChannel,
    ModeChange,
    ChannelModesReply,
    ChannelTopicReply,
    WhoReply,
    BanListReply,
    BanExemptListReply,
    InviteExemptListReply,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerMessage => "server_message",
            Self::PrivateMessage => "private_message",
            Self::Notice => "notice",
            Self::CtcpRequest => "ctcp_request",
            Self::CtcpReply => "ctcp_reply",
            Self::NickChange => "nick_change",
            Self::JoinChannel => "join_channel",
            Self::PartChannel => "part_channel",
            Self::ModeChange => "mode_change",
            Self::ChannelModesReply => "channel_modes_reply",
            Self::ChannelTopicReply => "channel_topic_reply",
            Self::WhoReply => "who_reply",
            Self::BanListReply => "ban_list_reply",
            Self::BanExemptListReply => "ban_exempt_list_reply",
            Self::InviteExemptListReply => "invite_exempt_list_reply",
        }
    }

    /// Kinds that can carry a bot command in their body.
    pub fn carries_commands(&self) -> bool {
        matches!(self, Self::PrivateMessage | Self::Notice)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified inbound line.
///
/// `body` is computed once during classification; `body_fields` and `args`
/// are derived from it and never drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedEvent {
    pub kind: EventKind,
    /// The line with a single leading `:` removed.
    pub raw: String,
    pub raw_fields: Vec<String>,
    pub body: String,
    pub body_fields: Vec<String>,
    /// `body` minus its first word.
    pub args: String,
    pub speaker: Identity,
    pub destination: String,
    /// Where a reply should go: the channel, or the speaker for private traffic.
    pub reply_target: String,
    /// The destination was not a channel.
    pub private: bool,
    /// [`NetworkCapabilities::revision`] at classification time.
    pub caps_revision: u64,
    pub timestamp: DateTime<Utc>,
}

impl TypedEvent {
    /// The command or numeric token (`PRIVMSG`, `005`, ...), empty if absent.
    pub fn command(&self) -> &str {
        self.raw_fields.get(1).map(String::as_str).unwrap_or("")
    }

    /// Raw field by index, empty when out of range.
    pub fn field(&self, index: usize) -> &str {
        self.raw_fields.get(index).map(String::as_str).unwrap_or("")
    }

    /// Classify the same line again under newer capabilities. The arrival
    /// timestamp is kept.
    pub fn reclassify(&self, caps: &NetworkCapabilities) -> TypedEvent {
        let mut event = classify(&format!(":{}", self.raw), caps);
        event.timestamp = self.timestamp;
        event
    }

    /// For CTCP kinds, the CTCP command and its parameters.
    pub fn ctcp(&self) -> Option<(&str, Option<&str>)> {
        match self.kind {
            EventKind::CtcpRequest | EventKind::CtcpReply => {
                Some(crate::proto::ctcp::split_payload(&self.body))
            }
            _ => None,
        }
    }
}
