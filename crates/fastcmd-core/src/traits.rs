//! Collaborator contracts consumed by the scheduler.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::block::BlockConfig;
use crate::error::Result;

/// Runs the opaque action string of a block.
///
/// The scheduler only learns that the call returned. An `Err` (or a panic)
/// is logged and otherwise ignored; it never leaves a block stuck running.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Executor name for logs.
    fn name(&self) -> &str;

    async fn execute(&self, action: &str) -> Result<()>;
}

/// Persistence for block configurations. Run state is never stored.
pub trait BlockStore: Send + Sync {
    fn load_all(&self) -> Result<BTreeMap<String, BlockConfig>>;

    fn save_all(&self, blocks: &BTreeMap<String, BlockConfig>) -> Result<()>;
}
