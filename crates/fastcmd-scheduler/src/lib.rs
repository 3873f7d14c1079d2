//! # FastCMD Scheduler
//!
//! Execution engine for virtual command blocks: named, reusable actions that
//! fire after a delay, repeat on a period, and hand off to a connected block.
//!
//! ## Design Principles
//! - One tokio task per running block, zero work while idle
//! - At most one live task handle per block name; the engine owns them all
//! - Firings look blocks up by name, never through captured snapshots
//! - Executor failures never leave a block stuck running
//!
//! ## Architecture
//! ```text
//! FastCmd (context)
//!   ├── Registry ──── JsonBlockStore (blocks.json)
//!   ├── Scheduler
//!   │     ├── Normal / Chain: fire once after delay
//!   │     ├── Repeating: fire every max(delay, 1) ticks
//!   │     │     └── monitor::is_expired → stop on the expiry firing
//!   │     └── after each firing → chain::next_hop → run(successor)
//!   └── ActionExecutor (ShellExecutor | LogExecutor)
//! ```

pub mod chain;
pub mod clock;
pub mod context;
pub mod engine;
pub mod executor;
pub mod monitor;
pub mod registry;
pub mod store;

pub use chain::{Hop, Lineage};
pub use clock::TickClock;
pub use context::{BlockUpdate, FastCmd, NewBlock};
pub use engine::Scheduler;
pub use executor::{LogExecutor, ShellExecutor};
pub use registry::Registry;
pub use store::{JsonBlockStore, MemoryBlockStore};
