//! Scheduler Engine — owns every live task handle and drives block firings.
//!
//! Each run is one tokio task sleeping until absolute tick deadlines measured
//! from the moment the run started. The engine keeps at most one handle per
//! block name; dropping a handle cancels its task. Firings never capture block
//! state: every firing looks the block up again by name, so edits made while a
//! block is scheduled are honoured.
//!
//! ```text
//! run(name) ──► handle map (1 per name) ──► tokio task
//!                                             │ sleep_until(start + delay + k·period)
//!                                             ▼
//!                                       begin_firing ── stale/expired ──► exit
//!                                             │ fire
//!                                             ▼
//!                                   ActionExecutor::execute
//!                                             │
//!                                       finish_firing ──► chain::next_hop ──► run(successor)
//! ```

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::Instant;

use fastcmd_core::block::BlockKind;
use fastcmd_core::error::{FastCmdError, Result};
use fastcmd_core::traits::ActionExecutor;

use crate::chain::{self, Hop, Lineage};
use crate::clock::TickClock;
use crate::monitor;
use crate::registry::Registry;

/// Live, cancellable unit of scheduled work. Dropping it cancels the task.
struct TaskHandle {
    id: u64,
    kind: BlockKind,
    _cancel: oneshot::Sender<()>,
}

/// Firing schedule of one run, fixed when the run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timing {
    delay: u64,
    /// `None` for one-shot kinds.
    period: Option<u64>,
}

impl Timing {
    fn for_kind(kind: BlockKind, delay: u64) -> Self {
        match kind {
            BlockKind::Normal | BlockKind::Chain => Self { delay, period: None },
            // A zero period would busy-loop.
            BlockKind::Repeating => Self {
                delay,
                period: Some(delay.max(1)),
            },
        }
    }

    fn is_one_shot(&self) -> bool {
        self.period.is_none()
    }

    /// Ticks from run start to firing `n`.
    fn offset(&self, n: u64) -> u64 {
        self.delay
            .saturating_add(self.period.unwrap_or(0).saturating_mul(n))
    }

    /// Index of the next firing at or after `n` that is not already in the past.
    /// Firings missed while a slow action ran are skipped, not replayed.
    fn next_index(&self, n: u64, elapsed: u64) -> u64 {
        match self.period {
            Some(period) if elapsed > self.offset(n) => {
                n.max((elapsed - self.delay).div_ceil(period))
            }
            _ => n,
        }
    }
}

enum Firing {
    /// Handle was cancelled, replaced, or the block was deleted.
    Stale,
    /// Disable window elapsed; the block is idle again.
    Expired,
    Fire {
        action: String,
        connected: Option<String>,
    },
}

enum Start {
    Started,
    AlreadyRunning,
}

struct Inner {
    registry: Arc<Registry>,
    executor: Arc<dyn ActionExecutor>,
    clock: TickClock,
    runtime: Handle,
    max_chain_depth: usize,
    /// The single mutual-exclusion domain: handle map + run-state writes.
    tasks: Mutex<HashMap<String, TaskHandle>>,
    next_id: AtomicU64,
}

impl Inner {
    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<String, TaskHandle>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The scheduler engine — the only owner of task handles.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create an engine that spawns onto the current tokio runtime.
    ///
    /// # Panics
    /// When called outside a tokio runtime.
    pub fn new(
        registry: Arc<Registry>,
        executor: Arc<dyn ActionExecutor>,
        clock: TickClock,
        max_chain_depth: usize,
    ) -> Self {
        Self::with_runtime(registry, executor, clock, max_chain_depth, Handle::current())
    }

    /// Create an engine that spawns onto `runtime`. `run`/`stop` may then be
    /// called from any thread.
    pub fn with_runtime(
        registry: Arc<Registry>,
        executor: Arc<dyn ActionExecutor>,
        clock: TickClock,
        max_chain_depth: usize,
        runtime: Handle,
    ) -> Self {
        tracing::debug!(
            "⏰ Scheduler ready (tick {:?}, executor '{}')",
            clock.tick(),
            executor.name()
        );
        Self {
            inner: Arc::new(Inner {
                registry,
                executor,
                clock,
                runtime,
                max_chain_depth,
                tasks: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn clock(&self) -> &TickClock {
        &self.inner.clock
    }

    /// Start (or restart) a block. Returns once the run is scheduled.
    pub fn run(&self, name: &str) -> Result<()> {
        self.start(name, Lineage::root(name), false).map(|_| ())
    }

    /// Cancel a block's run. Returns whether a run was scheduled.
    /// An in-flight action is not interrupted.
    pub fn stop(&self, name: &str) -> bool {
        let mut tasks = self.inner.lock_tasks();
        let cancelled = tasks.remove(name);
        self.inner.registry.update_run_state(name, |b| b.mark_idle());
        if let Some(handle) = &cancelled {
            tracing::info!("⏹️ Stopped '{}' ({})", name, handle.kind);
        }
        cancelled.is_some()
    }

    /// Cancel every run and mark every block idle. Returns how many runs were cancelled.
    pub fn stop_all(&self) -> usize {
        let mut tasks = self.inner.lock_tasks();
        let count = tasks.len();
        tasks.clear();
        self.inner.registry.mark_all_idle();
        if count > 0 {
            tracing::info!("⏹️ Stopped {count} running block(s)");
        }
        count
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        self.inner.lock_tasks().contains_key(name)
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock_tasks().len()
    }

    pub fn active_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.inner.lock_tasks().keys().cloned().collect();
        names.sort();
        names
    }

    fn start(&self, name: &str, lineage: Lineage, only_if_idle: bool) -> Result<Start> {
        let mut tasks = self.inner.lock_tasks();
        let started_at = Instant::now();
        let tick = self.inner.clock.tick_at(started_at);

        let planned = self
            .inner
            .registry
            .update_run_state(name, |block| {
                if only_if_idle && block.is_running() {
                    return None;
                }
                block.mark_running(tick);
                Some((block.kind, Timing::for_kind(block.kind, block.delay_ticks)))
            })
            .ok_or_else(|| FastCmdError::NotFound(name.to_string()))?;
        let Some((kind, timing)) = planned else {
            return Ok(Start::AlreadyRunning);
        };

        if tasks.remove(name).is_some() {
            tracing::debug!("🔄 '{name}' restarted, previous run cancelled");
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        tasks.insert(
            name.to_string(),
            TaskHandle {
                id,
                kind,
                _cancel: cancel_tx,
            },
        );

        let task = FiringTask {
            scheduler: Arc::downgrade(&self.inner),
            clock: self.inner.clock,
            name: name.to_string(),
            id,
            started_at,
            timing,
            lineage,
        };
        self.inner.runtime.spawn(task.drive(cancel_rx));

        tracing::info!(
            "▶️ Running '{}' ({}, delay {} ticks, started at tick {})",
            name,
            kind,
            timing.delay,
            tick
        );
        Ok(Start::Started)
    }

    /// Fire-check. Decides, under the lock, whether this firing still belongs
    /// to the block's current run and whether its disable window has elapsed.
    fn begin_firing(&self, name: &str, id: u64, repeating: bool) -> Firing {
        let mut tasks = self.inner.lock_tasks();
        if tasks.get(name).map(|h| h.id) != Some(id) {
            return Firing::Stale;
        }

        let now = self.inner.clock.now();
        let decision = self.inner.registry.update_run_state(name, |block| {
            if repeating && monitor::is_expired(block, now) {
                block.mark_idle();
                return None;
            }
            Some((block.action.clone(), block.connected_name.clone()))
        });

        match decision {
            Some(Some((action, connected))) => Firing::Fire { action, connected },
            Some(None) => {
                tasks.remove(name);
                tracing::info!("⏱️ '{name}' reached its disable time at tick {now}, now idle");
                Firing::Expired
            }
            None => {
                tasks.remove(name);
                tracing::debug!("🗑️ '{name}' was deleted while scheduled");
                Firing::Stale
            }
        }
    }

    /// Returns false when the run was cancelled while its action executed.
    fn finish_firing(&self, name: &str, id: u64, one_shot: bool) -> bool {
        let mut tasks = self.inner.lock_tasks();
        if tasks.get(name).map(|h| h.id) != Some(id) {
            tracing::debug!("'{name}' was cancelled during its action; not propagating");
            return false;
        }
        if one_shot {
            tasks.remove(name);
            self.inner.registry.update_run_state(name, |b| b.mark_idle());
        }
        true
    }

    async fn execute(&self, name: &str, action: &str) {
        tracing::debug!("🔔 Firing '{name}': {action}");
        let call = AssertUnwindSafe(self.inner.executor.execute(action)).catch_unwind();
        match call.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("⚠️ Action of '{name}' failed: {e}"),
            Err(_) => tracing::warn!("⚠️ Action of '{name}' panicked"),
        }
    }

    fn propagate(&self, name: &str, connected: Option<&str>, lineage: &Lineage) {
        match chain::next_hop(connected, lineage, self.inner.max_chain_depth, &self.inner.registry) {
            Hop::Unconnected => {}
            Hop::Dangling(target) => {
                tracing::debug!("🔗 '{name}' → '{target}' no longer exists, skipping");
            }
            Hop::Cycle(target) => {
                tracing::warn!(
                    "🔁 Chain cycle broken: {} → {}",
                    lineage.names().join(" → "),
                    target
                );
            }
            Hop::TooDeep(target) => {
                tracing::warn!(
                    "🔁 Chain from '{}' reached depth {}, not running '{}'",
                    lineage.names().first().map(String::as_str).unwrap_or(name),
                    lineage.depth(),
                    target
                );
            }
            Hop::Run { target, lineage } => match self.start(&target, lineage, true) {
                Ok(Start::Started) => tracing::debug!("🔗 '{name}' → '{target}'"),
                Ok(Start::AlreadyRunning) => {
                    tracing::debug!("🔗 '{name}' → '{target}' already running, skipping");
                }
                // Deleted between resolution and start; same as dangling.
                Err(e) => tracing::debug!("🔗 '{name}' → '{target}' skipped: {e}"),
            },
        }
    }
}

/// One run of one block, executing on the tokio runtime.
struct FiringTask {
    scheduler: Weak<Inner>,
    clock: TickClock,
    name: String,
    id: u64,
    started_at: Instant,
    timing: Timing,
    lineage: Lineage,
}

impl FiringTask {
    async fn drive(self, mut cancel: oneshot::Receiver<()>) {
        let mut n = 0;
        loop {
            let deadline = self.clock.after(self.started_at, self.timing.offset(n));
            tokio::select! {
                biased;
                // Sender dropped: handle removed from the map.
                _ = &mut cancel => return,
                _ = tokio::time::sleep_until(deadline) => {}
            }

            let Some(inner) = self.scheduler.upgrade() else {
                return;
            };
            let scheduler = Scheduler { inner };

            match scheduler.begin_firing(&self.name, self.id, !self.timing.is_one_shot()) {
                Firing::Stale | Firing::Expired => return,
                Firing::Fire { action, connected } => {
                    scheduler.execute(&self.name, &action).await;
                    if !scheduler.finish_firing(&self.name, self.id, self.timing.is_one_shot()) {
                        return;
                    }
                    scheduler.propagate(&self.name, connected.as_deref(), &self.lineage);
                }
            }

            if self.timing.is_one_shot() {
                return;
            }
            let elapsed = self.clock.ticks_between(self.started_at, Instant::now());
            n = self.timing.next_index(n + 1, elapsed);
        }
    }
}
