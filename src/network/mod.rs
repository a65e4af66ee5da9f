//! Network module.
//!
//! Contains the upstream connection, the outbound sender, the worker pool and
//! the engine that ties them together.

pub mod connection;
pub mod outbound;
mod pipeline;
pub mod worker;

pub use connection::{BoxedStream, IrcStream, connect};
pub use outbound::Outbound;
pub use pipeline::{Engine, ExitReason};
pub use worker::QueuedLine;
