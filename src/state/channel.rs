//! Channel-related types and state.

use super::modes::ModeSet;
use crate::isupport::NetworkCapabilities;
use crate::proto::Identity;
use std::collections::{BTreeSet, HashMap};

/// A user seen in a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMember {
    pub identity: Identity,
    /// Status mode letters (`o`, `v`, ...).
    pub channel_modes: BTreeSet<char>,
}

impl ChannelMember {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            channel_modes: BTreeSet::new(),
        }
    }

    /// Status symbols held by this member, highest rank first.
    pub fn prefixes(&self, caps: &NetworkCapabilities) -> String {
        caps.nick_prefixes
            .iter()
            .filter(|(mode, _)| self.channel_modes.contains(mode))
            .map(|(_, symbol)| *symbol)
            .collect()
    }
}

/// Tracked state for one channel the bot is in.
///
/// Member keys are nicks folded with the case mapping in effect when they
/// were inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub topic: String,
    pub modes: ModeSet,
    pub members: HashMap<String, ChannelMember>,
    pub bans: BTreeSet<String>,
    pub ban_exempts: BTreeSet<String>,
    pub invite_exempts: BTreeSet<String>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Aggregate mode string, e.g. `+klnt key 10`.
    pub fn mode_string(&self) -> String {
        self.modes.render()
    }
}
