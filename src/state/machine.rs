//! Connection bootstrap state machine.
//!
//! ```text
//! ┌────────────┐  NICK/USER   ┌────────────┐  375 / 422  ┌──────────────┐
//! │ Connecting ├─────────────►│ Registered ├────────────►│ AwaitingMotd │
//! └────────────┘              └─────┬──────┘             └──────┬───────┘
//!                                   │ 376 / 422                 │ 376 / 422
//!                                   ▼                           ▼
//!                              ┌─────────────────────────────────────┐
//!                              │ Ready (completion actions run once) │
//!                              └──────────────────┬──────────────────┘
//!                                                 │ EOF / socket error
//!                                                 ▼
//!                                 ┌─────────┐  exit hooks, save, unlock  ┌────────────┐
//!                                 │ Exiting ├───────────────────────────►│ Terminated │
//!                                 └─────────┘                            └────────────┘
//! ```
//!
//! Any state may move to `Exiting`. Transitions that do not apply to the
//! current state are ignored.

use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Registered,
    AwaitingMotd,
    Ready,
    Exiting,
    Terminated,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Registered => "registered",
            Self::AwaitingMotd => "awaiting-motd",
            Self::Ready => "ready",
            Self::Exiting => "exiting",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Tracks registration progress and guards the one-shot completion actions.
#[derive(Debug)]
pub struct BootstrapMachine {
    state: ConnectionState,
    completed: bool,
}

impl Default for BootstrapMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapMachine {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
            completed: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    fn transition(&mut self, to: ConnectionState) {
        debug!(from = %self.state, to = %to, "Connection state transition");
        self.state = to;
    }

    /// NICK and USER have been written.
    pub fn registration_sent(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.transition(ConnectionState::Registered);
        }
    }

    /// RPL_MOTDSTART (375).
    pub fn motd_started(&mut self) {
        if self.state == ConnectionState::Registered {
            self.transition(ConnectionState::AwaitingMotd);
        }
    }

    /// RPL_ENDOFMOTD (376) or ERR_NOMOTD (422).
    ///
    /// Returns `true` exactly once per connection: the caller runs the
    /// completion actions when it does.
    pub fn motd_finished(&mut self) -> bool {
        if self.completed {
            debug!("Repeated end of MOTD ignored");
            return false;
        }
        match self.state {
            ConnectionState::Connecting
            | ConnectionState::Registered
            | ConnectionState::AwaitingMotd => {
                self.completed = true;
                self.transition(ConnectionState::Ready);
                true
            }
            ConnectionState::Ready | ConnectionState::Exiting | ConnectionState::Terminated => {
                false
            }
        }
    }

    /// Socket closed or failed.
    pub fn disconnected(&mut self) {
        if self.state != ConnectionState::Terminated && self.state != ConnectionState::Exiting {
            self.transition(ConnectionState::Exiting);
        }
    }

    /// Exit sequence finished.
    pub fn terminate(&mut self) {
        if self.state == ConnectionState::Exiting {
            self.transition(ConnectionState::Terminated);
        }
    }
}

/// Commands sent once the MOTD is over: bot mode, then the autojoin list.
pub fn completion_commands(nick: &str, bot_mode: Option<&str>, channels: &[String]) -> Vec<String> {
    let mut commands = Vec::with_capacity(2);
    if let Some(mode) = bot_mode.filter(|m| !m.is_empty()) {
        commands.push(format!("MODE {nick} {mode}"));
    }
    if !channels.is_empty() {
        commands.push(format!("JOIN {}", channels.join(",")));
    }
    commands
}
