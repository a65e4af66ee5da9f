//! Pluggable handlers and hook dispatch.
//!
//! - [`traits`]: the `Handler` trait and `HookContext`
//! - [`command`]: command-name derivation from message bodies
//! - [`registry`]: handler registration and isolated dispatch
//! - [`builtin`]: handlers every bot gets (CTCP replies)

pub mod builtin;
pub mod command;
pub mod registry;
pub mod traits;

pub use builtin::CtcpResponder;
pub use command::command_name;
pub use registry::{APOLOGY, DispatchReport, HandlerRegistry};
pub use traits::{Handler, HookContext};
