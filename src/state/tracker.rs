//! Channel and membership tracking.
//!
//! The tracker is plain data plus the update rules for it; it is owned by the
//! state actor and never shared. Every operation tolerates references to
//! channels or members it does not know about: the anomaly is logged and the
//! update is dropped.

use super::channel::{Channel, ChannelMember};
use super::modes::{ModeDelta, parse_mode_tokens};
use crate::isupport::{ModeClass, NetworkCapabilities};
use crate::proto::Identity;
use std::collections::HashMap;
use tracing::{debug, info};

/// Which list a list-mode entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Ban,
    BanExempt,
    InviteExempt,
}

impl ListKind {
    fn from_mode(mode: char) -> Option<Self> {
        match mode {
            'b' => Some(Self::Ban),
            'e' => Some(Self::BanExempt),
            'I' => Some(Self::InviteExempt),
            _ => None,
        }
    }
}

/// Channel table plus the bot's own nick.
#[derive(Debug, Default)]
pub struct ChannelTracker {
    channels: HashMap<String, Channel>,
    bot_nick: String,
}

impl ChannelTracker {
    pub fn new(bot_nick: impl Into<String>) -> Self {
        Self {
            channels: HashMap::new(),
            bot_nick: bot_nick.into(),
        }
    }

    pub fn bot_nick(&self) -> &str {
        &self.bot_nick
    }

    pub fn set_bot_nick(&mut self, nick: impl Into<String>) {
        self.bot_nick = nick.into();
    }

    pub fn is_bot(&self, caps: &NetworkCapabilities, nick: &str) -> bool {
        caps.case_mapping.names_eq(&self.bot_nick, nick)
    }

    pub fn channel(&self, caps: &NetworkCapabilities, name: &str) -> Option<&Channel> {
        self.channels.get(&caps.case_mapping.to_lower(name))
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn is_member(&self, caps: &NetworkCapabilities, channel: &str, nick: &str) -> bool {
        self.channel(caps, channel)
            .is_some_and(|c| c.members.contains_key(&caps.case_mapping.to_lower(nick)))
    }

    fn channel_mut(&mut self, caps: &NetworkCapabilities, name: &str) -> Option<&mut Channel> {
        let channel = self.channels.get_mut(&caps.case_mapping.to_lower(name));
        if channel.is_none() {
            debug!(channel = %name, "Update for unknown channel dropped");
        }
        channel
    }

    fn channel_entry(&mut self, caps: &NetworkCapabilities, name: &str) -> &mut Channel {
        self.channels
            .entry(caps.case_mapping.to_lower(name))
            .or_insert_with(|| Channel::new(name))
    }

    /// A user joined. Returns whether the joiner is the bot.
    pub fn on_join(&mut self, caps: &NetworkCapabilities, channel: &str, identity: Identity) -> bool {
        let is_bot = self.is_bot(caps, &identity.nick);
        let key = caps.case_mapping.to_lower(&identity.nick);
        let entry = self.channel_entry(caps, channel);

        if is_bot {
            info!(channel = %channel, "Joined channel");
        }
        entry.members.insert(key, ChannelMember::new(identity));
        is_bot
    }

    /// A user left. Returns whether the leaver is the bot.
    pub fn on_part(&mut self, caps: &NetworkCapabilities, channel: &str, identity: &Identity) -> bool {
        self.remove_member(caps, channel, &identity.nick)
    }

    /// A user was kicked. Returns whether the victim is the bot.
    pub fn on_kick(&mut self, caps: &NetworkCapabilities, channel: &str, nick: &str) -> bool {
        self.remove_member(caps, channel, nick)
    }

    fn remove_member(&mut self, caps: &NetworkCapabilities, channel: &str, nick: &str) -> bool {
        if self.is_bot(caps, nick) {
            if self
                .channels
                .remove(&caps.case_mapping.to_lower(channel))
                .is_some()
            {
                info!(channel = %channel, "Left channel");
            } else {
                debug!(channel = %channel, "Left a channel that was not tracked");
            }
            return true;
        }

        let key = caps.case_mapping.to_lower(nick);
        if let Some(chan) = self.channel_mut(caps, channel)
            && chan.members.remove(&key).is_none()
        {
            debug!(channel = %channel, nick = %nick, "Departure of unknown member ignored");
        }
        false
    }

    /// A user quit the network. Returns the channels they were removed from.
    pub fn on_quit(&mut self, caps: &NetworkCapabilities, nick: &str) -> Vec<String> {
        let key = caps.case_mapping.to_lower(nick);
        self.channels
            .values_mut()
            .filter_map(|chan| chan.members.remove(&key).map(|_| chan.name.clone()))
            .collect()
    }

    /// A user changed nick. Returns whether it was the bot.
    pub fn on_nick_change(&mut self, caps: &NetworkCapabilities, old: &Identity, new_nick: &str) -> bool {
        let mapping = caps.case_mapping;
        let old_key = mapping.to_lower(&old.nick);
        let new_key = mapping.to_lower(new_nick);

        for chan in self.channels.values_mut() {
            if let Some(mut member) = chan.members.remove(&old_key) {
                member.identity.nick = new_nick.to_string();
                chan.members.insert(new_key.clone(), member);
            }
        }

        let is_bot = self.is_bot(caps, &old.nick);
        if is_bot {
            info!(old = %old.nick, new = %new_nick, "Bot nick changed");
            self.bot_nick = new_nick.to_string();
        }
        is_bot
    }

    /// Apply a MODE change to a channel.
    pub fn on_mode_change<S: AsRef<str>>(&mut self, caps: &NetworkCapabilities, channel: &str, tokens: &[S]) {
        let deltas = parse_mode_tokens(tokens, caps);
        let mapping = caps.case_mapping;
        let Some(chan) = self.channel_mut(caps, channel) else {
            return;
        };
        for delta in deltas {
            apply_delta(chan, &delta, |nick| mapping.to_lower(nick));
        }
    }

    /// Replace the channel's non-list mode state with an RPL_CHANNELMODEIS snapshot.
    pub fn on_channel_modes_reply<S: AsRef<str>>(
        &mut self,
        caps: &NetworkCapabilities,
        channel: &str,
        tokens: &[S],
    ) {
        let deltas = parse_mode_tokens(tokens, caps);
        let Some(chan) = self.channel_mut(caps, channel) else {
            return;
        };
        chan.modes.clear();
        for delta in deltas.iter().filter(|d| d.adding) {
            match delta.class {
                ModeClass::Always | ModeClass::SetOnly | ModeClass::Flag => {
                    chan.modes.set(delta.mode, delta.param.clone());
                }
                ModeClass::List | ModeClass::Prefix => {}
            }
        }
    }

    /// Merge a WHO reply into the channel, creating the channel and member if needed.
    ///
    /// `status` is the WHO flags field (`H@`, `G+`, `H*@`); symbols are
    /// decoded through the PREFIX table and anything else is ignored.
    pub fn on_who_reply(&mut self, caps: &NetworkCapabilities, channel: &str, identity: Identity, status: &str) {
        let modes: Vec<char> = status.chars().filter_map(|c| caps.mode_for_prefix(c)).collect();
        let key = caps.case_mapping.to_lower(&identity.nick);
        let chan = self.channel_entry(caps, channel);

        let member = chan
            .members
            .entry(key)
            .or_insert_with(|| ChannelMember::new(identity.clone()));
        member.identity = identity;
        member.channel_modes.extend(modes);
    }

    pub fn on_topic(&mut self, caps: &NetworkCapabilities, channel: &str, topic: &str) {
        if let Some(chan) = self.channel_mut(caps, channel) {
            chan.topic = topic.to_string();
        }
    }

    pub fn on_ban_entry(&mut self, caps: &NetworkCapabilities, channel: &str, mask: &str) {
        self.add_list_entry(caps, channel, ListKind::Ban, mask);
    }

    pub fn on_ban_exempt_entry(&mut self, caps: &NetworkCapabilities, channel: &str, mask: &str) {
        self.add_list_entry(caps, channel, ListKind::BanExempt, mask);
    }

    pub fn on_invite_exempt_entry(&mut self, caps: &NetworkCapabilities, channel: &str, mask: &str) {
        self.add_list_entry(caps, channel, ListKind::InviteExempt, mask);
    }

    fn add_list_entry(&mut self, caps: &NetworkCapabilities, channel: &str, kind: ListKind, mask: &str) {
        if mask.is_empty() {
            return;
        }
        if let Some(chan) = self.channel_mut(caps, channel) {
            list_for(chan, kind).insert(mask.to_string());
        }
    }
}

fn list_for(chan: &mut Channel, kind: ListKind) -> &mut std::collections::BTreeSet<String> {
    match kind {
        ListKind::Ban => &mut chan.bans,
        ListKind::BanExempt => &mut chan.ban_exempts,
        ListKind::InviteExempt => &mut chan.invite_exempts,
    }
}

fn apply_delta(chan: &mut Channel, delta: &ModeDelta, fold: impl Fn(&str) -> String) {
    match delta.class {
        ModeClass::Prefix => {
            let Some(nick) = delta.param.as_deref() else {
                return;
            };
            let Some(member) = chan.members.get_mut(&fold(nick)) else {
                debug!(channel = %chan.name, nick = %nick, "Status mode for unknown member ignored");
                return;
            };
            if delta.adding {
                member.channel_modes.insert(delta.mode);
            } else {
                member.channel_modes.remove(&delta.mode);
            }
        }
        ModeClass::List => {
            let Some(mask) = delta.param.clone() else {
                return;
            };
            let Some(kind) = ListKind::from_mode(delta.mode) else {
                debug!(channel = %chan.name, mode = %delta.mode, "Untracked list mode");
                return;
            };
            let list = list_for(chan, kind);
            if delta.adding {
                list.insert(mask);
            } else {
                list.remove(&mask);
            }
        }
        ModeClass::Always | ModeClass::SetOnly | ModeClass::Flag => {
            if delta.adding {
                chan.modes.set(delta.mode, delta.param.clone());
            } else {
                chan.modes.unset(delta.mode);
            }
        }
    }
}
