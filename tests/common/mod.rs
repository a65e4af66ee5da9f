//! Integration test common infrastructure.
//!
//! Provides a scripted fake IRC server on the far end of an in-memory
//! duplex stream, plus helpers for starting an engine against it.

pub mod server;

#[allow(unused_imports)]
pub use server::{FakeServer, RunningBot, start_bot, test_config, wait_for};
