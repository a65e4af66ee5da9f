//! slirc-bot - Straylight IRC Bot
//!
//! An IRC client engine: connection bootstrap, typed event classification,
//! network capability tracking, channel state and a worker pool that feeds
//! pluggable handlers.

pub mod config;
pub mod error;
pub mod event;
pub mod hooks;
pub mod isupport;
pub mod lock;
pub mod network;
pub mod proto;
pub mod scheduler;
pub mod state;

pub use config::{BotConfig, ConfigStore, TomlConfigStore};
pub use error::{EngineError, HookError, HookResult, LockError};
pub use event::{EventKind, TypedEvent, classify};
pub use hooks::{Handler, HandlerRegistry, HookContext};
pub use isupport::NetworkCapabilities;
pub use lock::LockFile;
pub use network::{Engine, ExitReason, Outbound};
pub use state::{ConnectionState, StateHandle};
