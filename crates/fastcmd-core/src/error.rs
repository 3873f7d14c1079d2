//! Error types for FastCMD.

use thiserror::Error;

/// Errors surfaced by block operations.
#[derive(Debug, Error)]
pub enum FastCmdError {
    /// The operation referenced a block name that is not in the registry.
    #[error("Block not found: {0}")]
    NotFound(String),

    #[error("Block already exists: {0}")]
    AlreadyExists(String),

    /// Delay/disable out of bounds, unknown kind, missing connected block.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The action executor reported a failure. Never escapes the scheduler.
    #[error("Executor failure: {0}")]
    Executor(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FastCmdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = FastCmdError::NotFound("alpha".into());
        assert_eq!(err.to_string(), "Block not found: alpha");

        let err = FastCmdError::InvalidConfiguration("delay 90000 exceeds max 72000".into());
        assert!(err.to_string().contains("72000"));
    }

    #[test]
    fn test_io_conversion() {
        fn read_missing() -> Result<String> {
            Ok(std::fs::read_to_string("/definitely/not/here/fastcmd.toml")?)
        }
        assert!(matches!(read_missing(), Err(FastCmdError::Io(_))));
    }
}
