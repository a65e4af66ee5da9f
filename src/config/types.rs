//! Core configuration types.

use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config file {0} is empty and no backup could be used")]
    Empty(PathBuf),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Bot configuration.
///
/// Plain values come before the tables so the struct serializes back to
/// valid TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Channels joined once the MOTD is over.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Prefix that marks a channel message as a command (default: "!").
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Message sent with QUIT on shutdown.
    #[serde(default = "default_quit_message")]
    pub quit_message: String,
    /// User mode set on ourselves after registration (default: "+B").
    /// An empty string disables it.
    #[serde(default = "default_bot_mode")]
    pub bot_mode: String,
    /// Upstream IRC server.
    pub server: ServerConfig,
    /// Who the bot is on the network.
    pub identity: IdentityConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BotConfig {
    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: BotConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.nick.trim().is_empty() {
            return Err(ConfigError::Invalid("identity.nick must not be empty".into()));
        }
        if self.server.address.trim().is_empty() {
            return Err(ConfigError::Invalid("server.address must not be empty".into()));
        }
        if self.pipeline.workers == 0 {
            return Err(ConfigError::Invalid("pipeline.workers must be at least 1".into()));
        }
        if self.pipeline.message_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.message_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The bot mode, or `None` when disabled.
    pub fn bot_mode(&self) -> Option<&str> {
        Some(self.bot_mode.as_str()).filter(|m| !m.is_empty())
    }
}

/// Upstream server connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname or IP (e.g., "irc.libera.chat").
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    /// Server password sent with PASS (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Nick, username and realname.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub nick: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_realname")]
    pub realname: String,
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of workers pulling from the inbound queue (default: 5).
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Seconds a state update or a single hook may take before it is
    /// abandoned (default: 45).
    #[serde(default = "default_message_timeout")]
    pub message_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            message_timeout_secs: default_message_timeout(),
        }
    }
}

/// Periodic task intervals, in seconds. Zero disables a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
    #[serde(default = "default_autosave")]
    pub autosave_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: default_keepalive(),
            autosave_secs: default_autosave(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for daily-rotated log files. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}
