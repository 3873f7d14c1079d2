//! Action executors — what actually happens when a block fires.

use async_trait::async_trait;

use fastcmd_core::error::{FastCmdError, Result};
use fastcmd_core::traits::ActionExecutor;

/// Runs each action through a shell (`sh -c <action>`).
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::with_shell("sh")
    }

    pub fn with_shell(shell: &str) -> Self {
        Self {
            shell: shell.to_string(),
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionExecutor for ShellExecutor {
    fn name(&self) -> &str {
        "shell"
    }

    async fn execute(&self, action: &str) -> Result<()> {
        let output = tokio::process::Command::new(&self.shell)
            .arg("-c")
            .arg(action)
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::info!("📤 {}", stdout.trim_end());
        }
        if output.status.success() {
            Ok(())
        } else {
            Err(FastCmdError::Executor(format!(
                "`{}` exited with {}: {}",
                action,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

/// Only logs actions. Used for dry runs.
pub struct LogExecutor;

#[async_trait]
impl ActionExecutor for LogExecutor {
    fn name(&self) -> &str {
        "log"
    }

    async fn execute(&self, action: &str) -> Result<()> {
        tracing::info!("▶️ {action}");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shell_success_and_failure() {
        let exec = ShellExecutor::new();
        assert!(exec.execute("true").await.is_ok());
        assert!(matches!(
            exec.execute("exit 3").await,
            Err(FastCmdError::Executor(_))
        ));
    }

    #[tokio::test]
    async fn test_log_executor() {
        assert!(LogExecutor.execute("say hello").await.is_ok());
        assert_eq!(LogExecutor.name(), "log");
    }
}
