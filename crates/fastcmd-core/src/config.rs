//! FastCMD configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FastCmdError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastCmdConfig {
    #[serde(default)]
    pub debug: bool,
    /// Length of one scheduling tick in milliseconds.
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    /// Where blocks.json lives. Empty = ~/.fastcmd.
    #[serde(default)]
    pub data_dir: String,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

fn default_tick_millis() -> u64 { 50 }

impl Default for FastCmdConfig {
    fn default() -> Self {
        Self {
            debug: false,
            tick_millis: default_tick_millis(),
            data_dir: String::new(),
            commands: CommandsConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl FastCmdConfig {
    /// Load config from the default path (~/.fastcmd/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FastCmdError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| FastCmdError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        tracing::debug!("⚙️ Config loaded from {}", path.display());
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| FastCmdError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    fn validate(&self) -> Result<()> {
        if self.tick_millis == 0 {
            return Err(FastCmdError::Config("tick_millis must be at least 1".into()));
        }
        if self.commands.default_delay > self.commands.max_delay {
            return Err(FastCmdError::Config(format!(
                "default_delay {} exceeds max_delay {}",
                self.commands.default_delay, self.commands.max_delay
            )));
        }
        if self.commands.default_disable_time > self.commands.max_disable_time {
            return Err(FastCmdError::Config(format!(
                "default_disable_time {} exceeds max_disable_time {}",
                self.commands.default_disable_time, self.commands.max_disable_time
            )));
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the FastCMD home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".fastcmd")
    }

    /// Directory holding the block store.
    pub fn data_path(&self) -> PathBuf {
        if self.data_dir.is_empty() {
            Self::home_dir()
        } else {
            PathBuf::from(&self.data_dir)
        }
    }
}

/// Bounds and defaults applied when blocks are created or changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_max_ticks")]
    pub max_delay: u64,
    #[serde(default = "default_max_ticks")]
    pub max_disable_time: u64,
    #[serde(default)]
    pub default_delay: u64,
    #[serde(default)]
    pub default_disable_time: u64,
}

/// One hour at 50ms per tick.
fn default_max_ticks() -> u64 { 72_000 }

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            max_delay: default_max_ticks(),
            max_disable_time: default_max_ticks(),
            default_delay: 0,
            default_disable_time: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Longest chain of propagated runs before the chain is broken.
    #[serde(default = "default_max_chain_depth")]
    pub max_chain_depth: usize,
}

fn default_max_chain_depth() -> usize { 32 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: default_max_chain_depth(),
        }
    }
}
