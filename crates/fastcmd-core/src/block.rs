//! Block definitions — the core data model for virtual command blocks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FastCmdError;

/// How a block behaves once it is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// Fire once after the delay, then propagate.
    Normal,
    /// Same firing behaviour as `Normal`; marks a block meant to sit in a chain.
    Chain,
    /// Fire every `max(delay, 1)` ticks until stopped or the disable window ends.
    Repeating,
}

impl BlockKind {
    pub const ALL: [BlockKind; 3] = [BlockKind::Normal, BlockKind::Chain, BlockKind::Repeating];

    pub fn english_name(&self) -> &'static str {
        match self {
            BlockKind::Normal => "Normal",
            BlockKind::Chain => "Chain",
            BlockKind::Repeating => "Repeating",
        }
    }

    pub fn russian_name(&self) -> &'static str {
        match self {
            BlockKind::Normal => "Обычный",
            BlockKind::Chain => "Цепной",
            BlockKind::Repeating => "Цикличный",
        }
    }

    /// Whether the block terminates after its first firing.
    pub fn is_one_shot(&self) -> bool {
        !matches!(self, BlockKind::Repeating)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.english_name())
    }
}

impl FromStr for BlockKind {
    type Err = FastCmdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        BlockKind::ALL
            .into_iter()
            .find(|k| {
                k.english_name().eq_ignore_ascii_case(s)
                    || k.russian_name().to_lowercase() == s.to_lowercase()
            })
            .ok_or_else(|| {
                FastCmdError::InvalidConfiguration(format!(
                    "unknown block type '{s}' (expected Normal, Chain or Repeating)"
                ))
            })
    }
}

/// Persisted configuration of a block. Never carries run state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlockConfig {
    pub action: String,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default)]
    pub delay: u64,
    #[serde(default)]
    pub disable_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<String>,
}

/// A named virtual command block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDefinition {
    name: String,
    /// Opaque payload handed to the action executor.
    pub action: String,
    pub kind: BlockKind,
    pub delay_ticks: u64,
    /// 0 = never auto-disable.
    pub disable_after_ticks: u64,
    /// Successor run after this block fires.
    pub connected_name: Option<String>,
    is_running: bool,
    started_at_tick: u64,
}

impl BlockDefinition {
    /// Create an idle block.
    pub fn new(name: impl Into<String>, action: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            name: name.into(),
            action: action.into(),
            kind,
            delay_ticks: 0,
            disable_after_ticks: 0,
            connected_name: None,
            is_running: false,
            started_at_tick: 0,
        }
    }

    pub fn with_delay(mut self, ticks: u64) -> Self {
        self.delay_ticks = ticks;
        self
    }

    pub fn with_disable_after(mut self, ticks: u64) -> Self {
        self.disable_after_ticks = ticks;
        self
    }

    pub fn with_connected(mut self, name: impl Into<String>) -> Self {
        self.connected_name = Some(name.into());
        self
    }

    /// Rebuild an idle block from its persisted configuration.
    pub fn from_config(name: impl Into<String>, config: BlockConfig) -> Self {
        Self {
            name: name.into(),
            action: config.action,
            kind: config.kind,
            delay_ticks: config.delay,
            disable_after_ticks: config.disable_time,
            connected_name: config.connected.filter(|c| !c.is_empty()),
            is_running: false,
            started_at_tick: 0,
        }
    }

    pub fn to_config(&self) -> BlockConfig {
        BlockConfig {
            action: self.action.clone(),
            kind: self.kind,
            delay: self.delay_ticks,
            disable_time: self.disable_after_ticks,
            connected: self.connected_name.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Tick at which the current run started. Only meaningful while running.
    pub fn started_at_tick(&self) -> Option<u64> {
        self.is_running.then_some(self.started_at_tick)
    }

    /// Enter the running state at `tick`.
    pub fn mark_running(&mut self, tick: u64) {
        self.is_running = true;
        self.started_at_tick = tick;
    }

    pub fn mark_idle(&mut self) {
        self.is_running = false;
        self.started_at_tick = 0;
    }

    /// Copy run state from another definition (used when a definition is replaced).
    pub fn inherit_run_state(&mut self, other: &BlockDefinition) {
        self.is_running = other.is_running;
        self.started_at_tick = other.started_at_tick;
    }
}
