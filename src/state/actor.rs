//! State actor.
//!
//! A single task owns the channel tracker, the bootstrap machine and the
//! bot's nick. Workers classify lines in parallel and then submit the typed
//! event here; the actor applies events strictly in the order the reader
//! received them.
//!
//! # Ordering
//!
//! The reader stamps each queued line with a sequence number. Submissions
//! that arrive early wait in a reorder buffer until every lower number has
//! been applied or released. A worker that gives up on a line before
//! submitting it (timeout, panic) drops its [`SequenceGuard`], which
//! releases the number so later events are not held back.
//!
//! An event classified before an earlier 004/005 line was applied carries a
//! stale capability revision. It is classified again before it is applied,
//! and the fresh event is what the submitter gets back to dispatch.

use super::SharedCapabilities;
use super::channel::Channel;
use super::machine::{BootstrapMachine, ConnectionState, completion_commands};
use super::tracker::ChannelTracker;
use crate::error::EngineError;
use crate::event::{EventKind, TypedEvent};
use crate::network::outbound::{Outbound, channel_sync_lines};
use crate::proto::{Identity, numeric};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Actions run once registration completes.
#[derive(Debug, Clone, Default)]
pub struct BootstrapPlan {
    pub bot_mode: Option<String>,
    pub channels: Vec<String>,
}

/// Requests handled by the state actor.
#[derive(Debug)]
pub enum StateRequest {
    /// Apply a classified event in sequence order.
    Apply {
        seq: u64,
        event: Arc<TypedEvent>,
        reply_tx: oneshot::Sender<Arc<TypedEvent>>,
    },
    /// The line with this sequence number will never be submitted.
    Release { seq: u64 },
    /// NICK/USER were written.
    RegistrationSent,
    /// The connection closed.
    Disconnected,
    /// The exit sequence finished.
    Terminated,
    GetChannel {
        name: String,
        reply_tx: oneshot::Sender<Option<Channel>>,
    },
    ListChannels {
        reply_tx: oneshot::Sender<Vec<String>>,
    },
    IsMember {
        channel: String,
        nick: String,
        reply_tx: oneshot::Sender<bool>,
    },
    BotNick {
        reply_tx: oneshot::Sender<String>,
    },
    GetConnectionState {
        reply_tx: oneshot::Sender<ConnectionState>,
    },
}

enum Pending {
    Apply(Arc<TypedEvent>, oneshot::Sender<Arc<TypedEvent>>),
    Released,
}

pub struct StateActor {
    tracker: ChannelTracker,
    machine: BootstrapMachine,
    caps: SharedCapabilities,
    outbound: Outbound,
    plan: BootstrapPlan,
    next_seq: u64,
    pending: BTreeMap<u64, Pending>,
}

impl StateActor {
    /// Spawn the actor task.
    pub fn spawn(
        bot_nick: impl Into<String>,
        plan: BootstrapPlan,
        caps: SharedCapabilities,
        outbound: Outbound,
    ) -> (StateHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let actor = Self {
            tracker: ChannelTracker::new(bot_nick),
            machine: BootstrapMachine::new(),
            caps,
            outbound,
            plan,
            next_seq: 0,
            pending: BTreeMap::new(),
        };

        let task = tokio::spawn(actor.run(rx));
        (StateHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<StateRequest>) {
        while let Some(request) = rx.recv().await {
            self.handle_request(request).await;
        }
        debug!(buffered = self.pending.len(), "State actor stopped");
    }

    async fn handle_request(&mut self, request: StateRequest) {
        match request {
            StateRequest::Apply {
                seq,
                event,
                reply_tx,
            } => {
                self.enqueue(seq, Pending::Apply(event, reply_tx));
                self.drain().await;
            }
            StateRequest::Release { seq } => {
                self.enqueue(seq, Pending::Released);
                self.drain().await;
            }
            StateRequest::RegistrationSent => self.machine.registration_sent(),
            StateRequest::Disconnected => self.machine.disconnected(),
            StateRequest::Terminated => self.machine.terminate(),
            StateRequest::GetChannel { name, reply_tx } => {
                let caps = self.caps.read();
                let _ = reply_tx.send(self.tracker.channel(&caps, &name).cloned());
            }
            StateRequest::ListChannels { reply_tx } => {
                let mut names: Vec<String> =
                    self.tracker.channels().map(|c| c.name.clone()).collect();
                names.sort();
                let _ = reply_tx.send(names);
            }
            StateRequest::IsMember {
                channel,
                nick,
                reply_tx,
            } => {
                let caps = self.caps.read();
                let _ = reply_tx.send(self.tracker.is_member(&caps, &channel, &nick));
            }
            StateRequest::BotNick { reply_tx } => {
                let _ = reply_tx.send(self.tracker.bot_nick().to_string());
            }
            StateRequest::GetConnectionState { reply_tx } => {
                let _ = reply_tx.send(self.machine.state());
            }
        }
    }

    fn enqueue(&mut self, seq: u64, pending: Pending) {
        if seq < self.next_seq {
            debug!(seq, next = self.next_seq, "Stale sequence number ignored");
            return;
        }
        self.pending.insert(seq, pending);
    }

    async fn drain(&mut self) {
        while let Some(pending) = self.pending.remove(&self.next_seq) {
            self.next_seq += 1;
            if let Pending::Apply(event, reply_tx) = pending {
                let event = self.refresh(event);
                let follow_up = self.apply(&event);
                if let Err(e) = self.outbound.send_all(follow_up).await {
                    debug!(error = %e, "Follow-up commands dropped");
                }
                let _ = reply_tx.send(event);
            }
        }
    }

    fn refresh(&self, event: Arc<TypedEvent>) -> Arc<TypedEvent> {
        let caps = self.caps.read();
        if event.caps_revision == caps.revision() {
            return event;
        }
        debug!(line = %event.raw, "Reclassifying under updated capabilities");
        Arc::new(event.reclassify(&caps))
    }

    /// Apply one event. Returns commands to send in response.
    fn apply(&mut self, ev: &TypedEvent) -> Vec<String> {
        let mut follow_up = Vec::new();

        match ev.kind {
            EventKind::ServerMessage => self.apply_server_message(ev, &mut follow_up),
            EventKind::NickChange => {
                let new_nick = ev.field(2).trim_start_matches(':');
                if new_nick.is_empty() {
                    debug!(line = %ev.raw, "NICK without a new nick");
                    return follow_up;
                }
                let caps = self.caps.read();
                self.tracker.on_nick_change(&caps, &ev.speaker, new_nick);
            }
            EventKind::JoinChannel => {
                let caps = self.caps.read();
                let channel = match ev.body_fields.first() {
                    Some(name) if caps.is_channel(name) => name.as_str(),
                    _ => ev.destination.trim_start_matches(':'),
                };
                if channel.is_empty() {
                    debug!(line = %ev.raw, "JOIN without a channel");
                    return follow_up;
                }
                if self.tracker.on_join(&caps, channel, ev.speaker.clone()) {
                    follow_up.extend(channel_sync_lines(channel));
                }
            }
            EventKind::PartChannel => {
                let caps = self.caps.read();
                let channel = ev.destination.trim_start_matches(':');
                self.tracker.on_part(&caps, channel, &ev.speaker);
            }
            EventKind::ModeChange => {
                if ev.private {
                    return follow_up;
                }
                let caps = self.caps.read();
                let tokens = ev.raw_fields.get(3..).unwrap_or_default();
                self.tracker.on_mode_change(&caps, &ev.destination, tokens);
            }
            EventKind::ChannelModesReply => {
                let caps = self.caps.read();
                let tokens = ev.raw_fields.get(4..).unwrap_or_default();
                self.tracker.on_channel_modes_reply(&caps, ev.field(3), tokens);
            }
            EventKind::ChannelTopicReply => {
                let caps = self.caps.read();
                self.tracker.on_topic(&caps, ev.field(3), &ev.body);
            }
            EventKind::WhoReply => {
                let caps = self.caps.read();
                let identity = Identity::new(ev.field(7), ev.field(4), ev.field(5));
                self.tracker.on_who_reply(&caps, ev.field(3), identity, ev.field(8));
            }
            EventKind::BanListReply => {
                let caps = self.caps.read();
                self.tracker.on_ban_entry(&caps, ev.field(3), ev.field(4));
            }
            EventKind::BanExemptListReply => {
                let caps = self.caps.read();
                self.tracker.on_ban_exempt_entry(&caps, ev.field(3), ev.field(4));
            }
            EventKind::InviteExemptListReply => {
                let caps = self.caps.read();
                self.tracker.on_invite_exempt_entry(&caps, ev.field(3), ev.field(4));
            }
            EventKind::PrivateMessage
            | EventKind::Notice
            | EventKind::CtcpRequest
            | EventKind::CtcpReply => {}
        }

        follow_up
    }

    fn apply_server_message(&mut self, ev: &TypedEvent, follow_up: &mut Vec<String>) {
        match ev.command() {
            numeric::RPL_WELCOME => {
                let nick = ev.field(2);
                if !nick.is_empty() {
                    info!(nick = %nick, "Registered with server");
                    self.tracker.set_bot_nick(nick);
                }
            }
            numeric::RPL_MYINFO => self.caps.write().apply_server_info(&ev.raw_fields),
            numeric::RPL_ISUPPORT => {
                self.caps.write().apply_isupport_line(&ev.raw_fields);
            }
            numeric::RPL_MOTDSTART => self.machine.motd_started(),
            numeric::RPL_ENDOFMOTD | numeric::ERR_NOMOTD => {
                if self.machine.motd_finished() {
                    info!(channels = ?self.plan.channels, "Connection ready");
                    follow_up.extend(completion_commands(
                        self.tracker.bot_nick(),
                        self.plan.bot_mode.as_deref(),
                        &self.plan.channels,
                    ));
                }
            }
            "KICK" => {
                let caps = self.caps.read();
                self.tracker.on_kick(&caps, ev.field(2), ev.field(3));
            }
            "QUIT" => {
                let caps = self.caps.read();
                let channels = self.tracker.on_quit(&caps, &ev.speaker.nick);
                debug!(nick = %ev.speaker.nick, channels = ?channels, "User quit");
            }
            _ => {}
        }
    }
}

/// Cloneable handle to the state actor.
#[derive(Debug, Clone)]
pub struct StateHandle {
    tx: mpsc::UnboundedSender<StateRequest>,
}

impl StateHandle {
    fn send(&self, request: StateRequest) -> Result<(), EngineError> {
        self.tx.send(request).map_err(|_| EngineError::StateClosed)
    }

    async fn ask<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> StateRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx))?;
        reply_rx.await.map_err(|_| EngineError::StateClosed)
    }

    /// Submit an event and wait until it has been applied. Returns the event
    /// as applied, which differs from the one submitted if capabilities
    /// changed in between.
    pub async fn apply(
        &self,
        seq: u64,
        event: impl Into<Arc<TypedEvent>>,
    ) -> Result<Arc<TypedEvent>, EngineError> {
        let event = event.into();
        self.ask(|reply_tx| StateRequest::Apply {
            seq,
            event,
            reply_tx,
        })
        .await
    }

    pub fn release(&self, seq: u64) {
        let _ = self.send(StateRequest::Release { seq });
    }

    /// Reserve `seq` for a line; see [`SequenceGuard`].
    pub fn guard(&self, seq: u64) -> SequenceGuard {
        SequenceGuard {
            seq,
            handle: self.clone(),
            armed: true,
        }
    }

    pub fn registration_sent(&self) -> Result<(), EngineError> {
        self.send(StateRequest::RegistrationSent)
    }

    pub fn disconnected(&self) -> Result<(), EngineError> {
        self.send(StateRequest::Disconnected)
    }

    pub fn terminated(&self) -> Result<(), EngineError> {
        self.send(StateRequest::Terminated)
    }

    /// Snapshot of one channel.
    pub async fn channel(&self, name: &str) -> Result<Option<Channel>, EngineError> {
        let name = name.to_string();
        self.ask(|reply_tx| StateRequest::GetChannel { name, reply_tx })
            .await
    }

    /// Names of every tracked channel, sorted.
    pub async fn channels(&self) -> Result<Vec<String>, EngineError> {
        self.ask(|reply_tx| StateRequest::ListChannels { reply_tx })
            .await
    }

    pub async fn is_member(&self, channel: &str, nick: &str) -> Result<bool, EngineError> {
        let channel = channel.to_string();
        let nick = nick.to_string();
        self.ask(|reply_tx| StateRequest::IsMember {
            channel,
            nick,
            reply_tx,
        })
        .await
    }

    pub async fn bot_nick(&self) -> Result<String, EngineError> {
        self.ask(|reply_tx| StateRequest::BotNick { reply_tx }).await
    }

    pub async fn connection_state(&self) -> Result<ConnectionState, EngineError> {
        self.ask(|reply_tx| StateRequest::GetConnectionState { reply_tx })
            .await
    }
}

/// Holds a sequence number until the event is submitted.
///
/// Dropping the guard without calling [`SequenceGuard::submit`] releases the
/// number.
#[derive(Debug)]
pub struct SequenceGuard {
    seq: u64,
    handle: StateHandle,
    armed: bool,
}

impl SequenceGuard {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Submit the event for this sequence number and wait for it to apply.
    pub async fn submit(mut self, event: Arc<TypedEvent>) -> Result<Arc<TypedEvent>, EngineError> {
        self.armed = false;
        self.handle.apply(self.seq, event).await
    }
}

impl Drop for SequenceGuard {
    fn drop(&mut self) {
        if self.armed {
            self.handle.release(self.seq);
        }
    }
}
