//! Error types for the bot engine.
//!
//! Each concern gets its own `thiserror` enum; the binary folds them into
//! `anyhow` at the top level.

use std::time::Duration;
use thiserror::Error;

pub use crate::config::ConfigError;

// ============================================================================
// Engine Errors (connection and pipeline)
// ============================================================================

/// Errors that stop the engine before or while it runs.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("invalid server name for TLS: {0}")]
    InvalidServerName(String),

    #[error("outbound channel closed")]
    OutboundClosed,

    #[error("state actor is gone")]
    StateClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

// ============================================================================
// Hook Errors (handler invocations)
// ============================================================================

/// Failure reported by a handler hook.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error("outbound channel closed")]
    OutboundClosed,

    #[error("state actor is gone")]
    StateClosed,

    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HookError {
    /// Static label for log fields.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadArguments(_) => "bad_arguments",
            Self::OutboundClosed => "outbound_closed",
            Self::StateClosed => "state_closed",
            Self::Failed(_) => "failed",
            Self::TimedOut(_) => "timed_out",
            Self::Other(_) => "other",
        }
    }
}

impl From<EngineError> for HookError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::OutboundClosed => Self::OutboundClosed,
            EngineError::StateClosed => Self::StateClosed,
            other => Self::Failed(other.to_string()),
        }
    }
}

pub type HookResult = Result<(), HookError>;

// ============================================================================
// Lock Errors (single-instance guard)
// ============================================================================

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another instance is running (pid {0})")]
    AlreadyRunning(u32),

    #[error("lock file I/O error: {0}")]
    Io(#[from] std::io::Error),
}
