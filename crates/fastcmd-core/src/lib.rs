//! # FastCMD Core
//!
//! Shared building blocks for the virtual command block system:
//! the block data model, configuration, the error type, and the
//! collaborator traits the scheduler depends on.
//!
//! ## Architecture
//! ```text
//! fastcmd-core
//!   ├── block   — BlockDefinition (identity + config + run state), BlockKind
//!   ├── config  — FastCmdConfig (~/.fastcmd/config.toml)
//!   ├── error   — FastCmdError + Result
//!   └── traits  — ActionExecutor, BlockStore
//! ```

pub mod block;
pub mod config;
pub mod error;
pub mod traits;

pub use block::{BlockConfig, BlockDefinition, BlockKind};
pub use config::FastCmdConfig;
pub use error::{FastCmdError, Result};
pub use traits::{ActionExecutor, BlockStore};
