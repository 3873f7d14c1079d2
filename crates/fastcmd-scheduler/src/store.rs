//! File-based block store — lightweight persistence.
//! Blocks saved as one JSON map keyed by name — human-readable, diff-friendly.
//! Only configuration is written; every block comes back idle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fastcmd_core::block::BlockConfig;
use fastcmd_core::error::{FastCmdError, Result};
use fastcmd_core::traits::BlockStore;

const STORE_FILE: &str = "blocks.json";

/// JSON file block store.
pub struct JsonBlockStore {
    path: PathBuf,
}

impl JsonBlockStore {
    /// Create a store in the given directory.
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(STORE_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockStore for JsonBlockStore {
    fn load_all(&self) -> Result<BTreeMap<String, BlockConfig>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let json = std::fs::read_to_string(&self.path)?;
        if json.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        // Decode entry by entry so one bad block does not lose the rest.
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&json)
            .map_err(|e| FastCmdError::Store(format!("Failed to parse {}: {e}", self.path.display())))?;
        let mut blocks = BTreeMap::new();
        for (name, value) in raw {
            match serde_json::from_value::<BlockConfig>(value) {
                Ok(config) => {
                    blocks.insert(name, config);
                }
                Err(e) => tracing::warn!("⚠️ Skipping block '{name}': {e}"),
            }
        }
        Ok(blocks)
    }

    fn save_all(&self, blocks: &BTreeMap<String, BlockConfig>) -> Result<()> {
        let json = serde_json::to_string_pretty(blocks)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!("💾 Saved {} blocks to {}", blocks.len(), self.path.display());
        Ok(())
    }
}

/// In-memory store. Useful for embedding and tests.
#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: Mutex<BTreeMap<String, BlockConfig>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockStore for MemoryBlockStore {
    fn load_all(&self) -> Result<BTreeMap<String, BlockConfig>> {
        Ok(self
            .blocks
            .lock()
            .map_err(|e| FastCmdError::Store(e.to_string()))?
            .clone())
    }

    fn save_all(&self, blocks: &BTreeMap<String, BlockConfig>) -> Result<()> {
        *self
            .blocks
            .lock()
            .map_err(|e| FastCmdError::Store(e.to_string()))? = blocks.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastcmd_core::block::BlockKind;

    fn config(action: &str, kind: BlockKind) -> BlockConfig {
        BlockConfig {
            action: action.into(),
            kind,
            delay: 20,
            disable_time: 0,
            connected: None,
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = std::env::temp_dir().join("fastcmd-test-store-empty");
        std::fs::remove_dir_all(&dir).ok();
        let store = JsonBlockStore::new(&dir).unwrap();
        assert!(store.load_all().unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join("fastcmd-test-store");
        let store = JsonBlockStore::new(&dir).unwrap();

        let mut blocks = BTreeMap::new();
        blocks.insert("sun".to_string(), config("time set day", BlockKind::Repeating));
        let mut chained = config("say next", BlockKind::Chain);
        chained.connected = Some("sun".into());
        blocks.insert("next".to_string(), chained);
        store.save_all(&blocks).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, blocks);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_bad_entry_is_skipped() {
        let dir = std::env::temp_dir().join("fastcmd-test-store-bad");
        let store = JsonBlockStore::new(&dir).unwrap();
        std::fs::write(
            store.path(),
            r#"{
                "good": {"action": "say ok", "type": "Normal", "delay": 1},
                "bad": {"action": "say no", "type": "Impulse"}
            }"#,
        )
        .unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["good"].delay, 1);
        assert_eq!(loaded["good"].disable_time, 0);
        std::fs::remove_dir_all(&dir).ok();
    }
}
