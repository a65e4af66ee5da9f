//! Persistent configuration storage.

use super::types::{BotConfig, ConfigError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Loads and saves the bot configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self) -> Result<BotConfig, ConfigError>;
    async fn save(&self, config: &BotConfig) -> Result<(), ConfigError>;
}

/// TOML file on disk with a `.bak` sibling.
///
/// An empty primary file is recovered from the backup on load. Every save
/// first copies the current primary to the backup.
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
    backup: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut backup = path.clone().into_os_string();
        backup.push(".bak");
        Self {
            path,
            backup: PathBuf::from(backup),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    async fn recover_from_backup(&self) -> Result<String, ConfigError> {
        let content = match tokio::fs::read_to_string(&self.backup).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Empty(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Err(ConfigError::Empty(self.path.clone()));
        }
        tokio::fs::write(&self.path, &content).await?;
        warn!(
            path = %self.path.display(),
            backup = %self.backup.display(),
            "Configuration file was empty, recovered from backup"
        );
        Ok(content)
    }
}

#[async_trait]
impl ConfigStore for TomlConfigStore {
    async fn load(&self) -> Result<BotConfig, ConfigError> {
        let mut content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            content = self.recover_from_backup().await?;
        }
        let config = BotConfig::parse(&content)?;
        info!(path = %self.path.display(), "Configuration loaded");
        Ok(config)
    }

    async fn save(&self, config: &BotConfig) -> Result<(), ConfigError> {
        let content = config.to_toml()?;

        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.len() > 0 => {
                tokio::fs::copy(&self.path, &self.backup).await?;
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        info!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }
}
