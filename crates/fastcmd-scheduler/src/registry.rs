//! Block Registry — in-memory name → definition map backed by a store.
//!
//! The registry is the only owner of block definitions. Readers get
//! snapshots; run state is written only by the scheduler engine.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use fastcmd_core::block::{BlockConfig, BlockDefinition};
use fastcmd_core::error::Result;
use fastcmd_core::traits::BlockStore;

/// Registry of all virtual command blocks.
pub struct Registry {
    blocks: RwLock<HashMap<String, BlockDefinition>>,
    store: Option<Arc<dyn BlockStore>>,
}

impl Registry {
    /// Create an empty registry without persistence.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
            store: None,
        }
    }

    /// Load every block from `store`. All blocks start idle.
    pub fn load(store: Arc<dyn BlockStore>) -> Result<Self> {
        let blocks: HashMap<String, BlockDefinition> = store
            .load_all()?
            .into_iter()
            .map(|(name, config)| {
                let block = BlockDefinition::from_config(name.clone(), config);
                (name, block)
            })
            .collect();
        tracing::info!("📦 Loaded {} virtual command blocks", blocks.len());
        Ok(Self {
            blocks: RwLock::new(blocks),
            store: Some(store),
        })
    }

    /// Insert or replace a block. A replaced block keeps its run state.
    pub fn put(&self, mut block: BlockDefinition) {
        let mut blocks = self.write();
        match blocks.get(block.name()) {
            Some(existing) => block.inherit_run_state(existing),
            None => block.mark_idle(),
        }
        tracing::debug!("📝 Block stored: '{}' ({})", block.name(), block.kind);
        blocks.insert(block.name().to_string(), block);
        self.persist(&blocks);
    }

    /// Insert an idle block only if the name is free.
    pub fn try_insert(&self, mut block: BlockDefinition) -> bool {
        let mut blocks = self.write();
        if blocks.contains_key(block.name()) {
            return false;
        }
        block.mark_idle();
        blocks.insert(block.name().to_string(), block);
        self.persist(&blocks);
        true
    }

    /// Snapshot of a block.
    pub fn get(&self, name: &str) -> Option<BlockDefinition> {
        self.read().get(name).cloned()
    }

    /// Remove a block. References held by other blocks are left dangling.
    pub fn remove(&self, name: &str) -> bool {
        let mut blocks = self.write();
        if blocks.remove(name).is_some() {
            self.persist(&blocks);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn list_names(&self) -> BTreeSet<String> {
        self.read().keys().cloned().collect()
    }

    /// Snapshots of every block, sorted by name.
    pub fn list(&self) -> Vec<BlockDefinition> {
        let mut blocks: Vec<_> = self.read().values().cloned().collect();
        blocks.sort_by(|a, b| a.name().cmp(b.name()));
        blocks
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Write all configurations to the store now.
    pub fn save(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.save_all(&Self::configs(&self.read())),
            None => Ok(()),
        }
    }

    /// Mutate one block's run state. Called by the engine with its lock held.
    pub(crate) fn update_run_state<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut BlockDefinition) -> R,
    ) -> Option<R> {
        self.write().get_mut(name).map(f)
    }

    pub(crate) fn mark_all_idle(&self) {
        for block in self.write().values_mut() {
            block.mark_idle();
        }
    }

    fn persist(&self, blocks: &HashMap<String, BlockDefinition>) {
        if let Some(store) = &self.store
            && let Err(e) = store.save_all(&Self::configs(blocks))
        {
            tracing::warn!("⚠️ Failed to save blocks: {e}");
        }
    }

    fn configs(blocks: &HashMap<String, BlockDefinition>) -> BTreeMap<String, BlockConfig> {
        blocks
            .iter()
            .map(|(name, block)| (name.clone(), block.to_config()))
            .collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, BlockDefinition>> {
        self.blocks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, BlockDefinition>> {
        self.blocks.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlockStore;
    use fastcmd_core::block::BlockKind;

    #[test]
    fn test_put_get_remove() {
        let registry = Registry::new();
        registry.put(BlockDefinition::new("a", "say a", BlockKind::Normal));
        registry.put(BlockDefinition::new("b", "say b", BlockKind::Chain).with_connected("a"));

        assert!(registry.contains("a"));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.list_names().into_iter().collect::<Vec<_>>(),
            vec!["a".to_string(), "b".to_string()]
        );

        // No cascade: b still points at the removed block.
        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert_eq!(registry.get("b").unwrap().connected_name.as_deref(), Some("a"));
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn test_put_keeps_run_state() {
        let registry = Registry::new();
        registry.put(BlockDefinition::new("a", "say a", BlockKind::Repeating));
        registry.update_run_state("a", |b| b.mark_running(9));

        registry.put(BlockDefinition::new("a", "say changed", BlockKind::Repeating));
        let block = registry.get("a").unwrap();
        assert_eq!(block.action, "say changed");
        assert_eq!(block.started_at_tick(), Some(9));
    }

    #[test]
    fn test_new_block_starts_idle() {
        let registry = Registry::new();
        let mut block = BlockDefinition::new("a", "say a", BlockKind::Normal);
        block.mark_running(3);
        registry.put(block);
        assert!(!registry.get("a").unwrap().is_running());
    }

    #[test]
    fn test_persists_through_store() {
        let store = Arc::new(MemoryBlockStore::new());
        let registry = Registry::load(store.clone()).unwrap();
        assert!(registry.is_empty());

        registry.put(BlockDefinition::new("a", "say a", BlockKind::Normal).with_delay(4));
        registry.update_run_state("a", |b| b.mark_running(1));

        let reloaded = Registry::load(store.clone()).unwrap();
        let block = reloaded.get("a").unwrap();
        assert_eq!(block.delay_ticks, 4);
        assert!(!block.is_running());

        registry.remove("a");
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_mark_all_idle() {
        let registry = Registry::new();
        registry.put(BlockDefinition::new("a", "x", BlockKind::Normal));
        registry.put(BlockDefinition::new("b", "y", BlockKind::Repeating));
        registry.update_run_state("a", |b| b.mark_running(0));
        registry.update_run_state("b", |b| b.mark_running(0));

        registry.mark_all_idle();
        assert!(registry.list().iter().all(|b| !b.is_running()));
    }
}
