//! FastCmd context — explicitly constructed owner of the registry, the
//! scheduler engine and the action executor. Operator operations go through
//! here so that every change is validated before it touches a block.

use std::sync::Arc;

use fastcmd_core::block::{BlockDefinition, BlockKind};
use fastcmd_core::config::FastCmdConfig;
use fastcmd_core::error::{FastCmdError, Result};
use fastcmd_core::traits::ActionExecutor;

use crate::clock::TickClock;
use crate::engine::Scheduler;
use crate::registry::Registry;
use crate::store::JsonBlockStore;

const GENERATED_PREFIX: &str = "cmdblock";

/// Request to create a block. Unset delay/disable use the configured defaults.
#[derive(Debug, Clone)]
pub struct NewBlock {
    pub name: Option<String>,
    pub action: String,
    pub kind: BlockKind,
    pub delay: Option<u64>,
    pub disable_time: Option<u64>,
    pub connected: Option<String>,
}

impl NewBlock {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            name: None,
            action: action.into(),
            kind: BlockKind::Normal,
            delay: None,
            disable_time: None,
            connected: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(mut self, kind: BlockKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn delay(mut self, ticks: u64) -> Self {
        self.delay = Some(ticks);
        self
    }

    pub fn disable_after(mut self, ticks: u64) -> Self {
        self.disable_time = Some(ticks);
        self
    }

    pub fn connected(mut self, name: impl Into<String>) -> Self {
        self.connected = Some(name.into());
        self
    }
}

/// Partial change to an existing block. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct BlockUpdate {
    pub action: Option<String>,
    pub kind: Option<BlockKind>,
    pub delay: Option<u64>,
    pub disable_time: Option<u64>,
    pub connected: Option<String>,
}

impl BlockUpdate {
    pub fn is_empty(&self) -> bool {
        self.action.is_none()
            && self.kind.is_none()
            && self.delay.is_none()
            && self.disable_time.is_none()
            && self.connected.is_none()
    }
}

/// Everything needed to manage and run virtual command blocks.
pub struct FastCmd {
    config: FastCmdConfig,
    registry: Arc<Registry>,
    scheduler: Scheduler,
}

impl FastCmd {
    /// Build a context around an existing registry. Must run inside a tokio runtime.
    pub fn new(
        config: FastCmdConfig,
        registry: Arc<Registry>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        let scheduler = Scheduler::new(
            registry.clone(),
            executor,
            TickClock::new(config.tick()),
            config.scheduler.max_chain_depth,
        );
        Self {
            config,
            registry,
            scheduler,
        }
    }

    /// Open the JSON block store in the configured data directory.
    pub fn open(config: FastCmdConfig, executor: Arc<dyn ActionExecutor>) -> Result<Self> {
        let store = JsonBlockStore::new(&config.data_path())?;
        tracing::info!("📂 Block store: {}", store.path().display());
        let registry = Arc::new(Registry::load(Arc::new(store))?);
        Ok(Self::new(config, registry, executor))
    }

    pub fn config(&self) -> &FastCmdConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Create a block and return its name.
    pub fn create(&self, request: NewBlock) -> Result<String> {
        let limits = &self.config.commands;
        let action = validate_action(&request.action)?;
        let delay = request.delay.unwrap_or(limits.default_delay);
        let disable_time = request.disable_time.unwrap_or(limits.default_disable_time);
        self.check_delay(delay)?;
        self.check_disable_time(disable_time)?;
        if let Some(connected) = &request.connected {
            self.check_connected(connected)?;
        }

        let name = match request.name {
            Some(name) => {
                validate_name(&name)?;
                name
            }
            None => self.generate_name(),
        };

        let mut block = BlockDefinition::new(name.clone(), action, request.kind)
            .with_delay(delay)
            .with_disable_after(disable_time);
        block.connected_name = request.connected;

        if !self.registry.try_insert(block) {
            return Err(FastCmdError::AlreadyExists(name));
        }
        tracing::info!("📅 Block created: '{}' ({})", name, request.kind);
        Ok(name)
    }

    /// Apply a validated change. On any error the block is left untouched.
    pub fn update(&self, name: &str, update: BlockUpdate) -> Result<()> {
        let mut block = self.get(name)?;

        if let Some(action) = &update.action {
            block.action = validate_action(action)?;
        }
        if let Some(kind) = update.kind {
            block.kind = kind;
        }
        if let Some(delay) = update.delay {
            self.check_delay(delay)?;
            block.delay_ticks = delay;
        }
        if let Some(disable_time) = update.disable_time {
            self.check_disable_time(disable_time)?;
            block.disable_after_ticks = disable_time;
        }
        if let Some(connected) = update.connected {
            self.check_connected(&connected)?;
            block.connected_name = Some(connected);
        }

        self.registry.put(block);
        tracing::info!("✏️ Block changed: '{name}'");
        Ok(())
    }

    /// Stop and delete a block. Blocks connected to it keep a dangling reference.
    pub fn delete(&self, name: &str) -> Result<()> {
        if !self.registry.contains(name) {
            return Err(FastCmdError::NotFound(name.to_string()));
        }
        self.scheduler.stop(name);
        self.registry.remove(name);
        tracing::info!("🗑️ Block deleted: '{name}'");
        Ok(())
    }

    pub fn run(&self, name: &str) -> Result<()> {
        self.scheduler.run(name)
    }

    /// Stop a block. Returns whether it had a run scheduled.
    pub fn stop(&self, name: &str) -> Result<bool> {
        if !self.registry.contains(name) {
            return Err(FastCmdError::NotFound(name.to_string()));
        }
        Ok(self.scheduler.stop(name))
    }

    pub fn get(&self, name: &str) -> Result<BlockDefinition> {
        self.registry
            .get(name)
            .ok_or_else(|| FastCmdError::NotFound(name.to_string()))
    }

    pub fn list(&self) -> Vec<BlockDefinition> {
        self.registry.list()
    }

    /// Stop every block and flush the store.
    pub fn shutdown(&self) -> Result<()> {
        self.scheduler.stop_all();
        self.registry.save()
    }

    fn generate_name(&self) -> String {
        (1..)
            .map(|n| format!("{GENERATED_PREFIX}{n}"))
            .find(|name| !self.registry.contains(name))
            .unwrap_or_else(|| GENERATED_PREFIX.to_string())
    }

    fn check_delay(&self, delay: u64) -> Result<()> {
        let max = self.config.commands.max_delay;
        if delay > max {
            return Err(FastCmdError::InvalidConfiguration(format!(
                "delay {delay} exceeds the maximum of {max} ticks"
            )));
        }
        Ok(())
    }

    fn check_disable_time(&self, disable_time: u64) -> Result<()> {
        let max = self.config.commands.max_disable_time;
        if disable_time > max {
            return Err(FastCmdError::InvalidConfiguration(format!(
                "disable time {disable_time} exceeds the maximum of {max} ticks"
            )));
        }
        Ok(())
    }

    fn check_connected(&self, connected: &str) -> Result<()> {
        if !self.registry.contains(connected) {
            return Err(FastCmdError::InvalidConfiguration(format!(
                "connected block '{connected}' does not exist"
            )));
        }
        Ok(())
    }
}

fn validate_action(action: &str) -> Result<String> {
    let action = action.trim();
    if action.is_empty() {
        return Err(FastCmdError::InvalidConfiguration("action is empty".into()));
    }
    Ok(action.to_string())
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '`') {
        return Err(FastCmdError::InvalidConfiguration(format!(
            "invalid block name '{name}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::RecordingExecutor;
    use crate::store::MemoryBlockStore;
    use fastcmd_core::traits::BlockStore;
    use std::time::Duration;

    fn context() -> (FastCmd, Arc<RecordingExecutor>) {
        let mut config = FastCmdConfig::default();
        config.commands.max_delay = 100;
        config.commands.max_disable_time = 200;
        config.commands.default_delay = 3;
        let exec = Arc::new(RecordingExecutor::default());
        let ctx = FastCmd::new(config, Arc::new(Registry::new()), exec.clone());
        (ctx, exec)
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_generates_names() {
        let (ctx, _) = context();
        let first = ctx.create(NewBlock::new("say one")).unwrap();
        let second = ctx.create(NewBlock::new("say two")).unwrap();
        assert_eq!(first, "cmdblock1");
        assert_eq!(second, "cmdblock2");

        let block = ctx.get("cmdblock1").unwrap();
        assert_eq!(block.delay_ticks, 3);
        assert_eq!(block.disable_after_ticks, 0);
        assert_eq!(block.kind, BlockKind::Normal);

        ctx.delete("cmdblock1").unwrap();
        assert_eq!(ctx.create(NewBlock::new("say three")).unwrap(), "cmdblock1");
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (ctx, _) = context();
        ctx.create(NewBlock::new("say a").named("a")).unwrap();

        let cases = [
            NewBlock::new("say b").named("b").delay(101),
            NewBlock::new("say b").named("b").disable_after(201),
            NewBlock::new("say b").named("b").connected("missing"),
            NewBlock::new("   ").named("b"),
            NewBlock::new("say b").named("has space"),
        ];
        for case in cases {
            assert!(matches!(
                ctx.create(case),
                Err(FastCmdError::InvalidConfiguration(_))
            ));
        }
        assert!(!ctx.registry().contains("b"));

        assert!(matches!(
            ctx.create(NewBlock::new("again").named("a")),
            Err(FastCmdError::AlreadyExists(_))
        ));
        assert!(ctx.create(NewBlock::new("say b").named("b").delay(100).connected("a")).is_ok());
    }

    #[tokio::test]
    async fn test_update_is_all_or_nothing() {
        let (ctx, _) = context();
        ctx.create(NewBlock::new("say a").named("a").delay(5)).unwrap();

        let bad = BlockUpdate {
            action: Some("say changed".into()),
            delay: Some(500),
            ..Default::default()
        };
        assert!(matches!(
            ctx.update("a", bad),
            Err(FastCmdError::InvalidConfiguration(_))
        ));
        let block = ctx.get("a").unwrap();
        assert_eq!(block.action, "say a");
        assert_eq!(block.delay_ticks, 5);

        let good = BlockUpdate {
            kind: Some(BlockKind::Repeating),
            disable_time: Some(40),
            connected: Some("a".into()),
            ..Default::default()
        };
        ctx.update("a", good).unwrap();
        let block = ctx.get("a").unwrap();
        assert_eq!(block.kind, BlockKind::Repeating);
        assert_eq!(block.disable_after_ticks, 40);
        assert_eq!(block.connected_name.as_deref(), Some("a"));

        assert!(matches!(
            ctx.update("ghost", BlockUpdate::default()),
            Err(FastCmdError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_stops_running_block() {
        let (ctx, exec) = context();
        ctx.create(NewBlock::new("say a").named("a").kind(BlockKind::Repeating).delay(1))
            .unwrap();
        ctx.run("a").unwrap();
        assert!(ctx.scheduler().is_scheduled("a"));

        ctx.delete("a").unwrap();
        assert!(!ctx.scheduler().is_scheduled("a"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(exec.actions().is_empty());
        assert!(matches!(ctx.delete("a"), Err(FastCmdError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_reports_state() {
        let (ctx, _) = context();
        ctx.create(NewBlock::new("say a").named("a")).unwrap();
        assert!(!ctx.stop("a").unwrap());
        ctx.run("a").unwrap();
        assert!(ctx.stop("a").unwrap());
        assert!(!ctx.get("a").unwrap().is_running());
        assert!(matches!(ctx.stop("ghost"), Err(FastCmdError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_persists_idle_blocks() {
        let store = Arc::new(MemoryBlockStore::new());
        let registry = Arc::new(Registry::load(store.clone()).unwrap());
        let ctx = FastCmd::new(
            FastCmdConfig::default(),
            registry,
            Arc::new(RecordingExecutor::default()),
        );
        ctx.create(NewBlock::new("say a").named("a").kind(BlockKind::Repeating).delay(2))
            .unwrap();
        ctx.run("a").unwrap();

        ctx.shutdown().unwrap();
        assert_eq!(ctx.scheduler().active_count(), 0);
        assert!(!ctx.get("a").unwrap().is_running());

        let saved = store.load_all().unwrap();
        assert_eq!(saved["a"].kind, BlockKind::Repeating);
        assert_eq!(saved["a"].delay, 2);
    }

    #[tokio::test]
    async fn test_open_uses_data_dir() {
        let dir = std::env::temp_dir().join("fastcmd-test-context-open");
        std::fs::remove_dir_all(&dir).ok();
        let mut config = FastCmdConfig::default();
        config.data_dir = dir.to_string_lossy().into_owned();

        let ctx = FastCmd::open(config.clone(), Arc::new(RecordingExecutor::default())).unwrap();
        ctx.create(NewBlock::new("say a").named("a")).unwrap();
        drop(ctx);

        let reopened = FastCmd::open(config, Arc::new(RecordingExecutor::default())).unwrap();
        assert_eq!(reopened.get("a").unwrap().action, "say a");
        std::fs::remove_dir_all(&dir).ok();
    }
}
