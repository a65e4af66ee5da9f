//! Configuration loading and management.
//!
//! - [`types`]: the `BotConfig` tree and its validation
//! - [`store`]: the `ConfigStore` trait and the TOML file implementation

mod defaults;
mod store;
mod types;

pub use store::{ConfigStore, TomlConfigStore};
pub use types::{
    BotConfig, ConfigError, IdentityConfig, LoggingConfig, PipelineConfig, ScheduleConfig,
    ServerConfig,
};
