//! State management module.
//!
//! Contains the channel tracker, the bootstrap state machine and the actor
//! that owns both.

pub mod actor;
mod channel;
pub mod machine;
pub mod modes;
mod tracker;

pub use actor::{BootstrapPlan, SequenceGuard, StateActor, StateHandle};
pub use channel::{Channel, ChannelMember};
pub use machine::{BootstrapMachine, ConnectionState};
pub use modes::ModeSet;
pub use tracker::ChannelTracker;

use crate::isupport::NetworkCapabilities;
use parking_lot::RwLock;
use std::sync::Arc;

/// Capability snapshot written by the state actor and read by workers.
pub type SharedCapabilities = Arc<RwLock<NetworkCapabilities>>;
