//! Server process launching
//!
//! Starting and stopping the script server is delegated to one external
//! command, typically `docker compose -f <file>`, invoked with the `up -d`
//! and `stop` verbs.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::common::{Error, Result};

/// Starts and stops the script server
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

/// Runs a compose-style command through the shell
#[derive(Debug, Clone)]
pub struct ComposeLauncher {
    command: String,
}

impl ComposeLauncher {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run `<command> <verb>`; a non-zero exit is only logged
    async fn invoke(&self, verb: &str) -> Result<()> {
        let line = format!("{} {}", self.command, verb);
        tracing::info!("Running `{}`", line);

        let status = Command::new("sh")
            .arg("-c")
            .arg(&line)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Error::LaunchFailed(format!("`{}`: {}", line, e)))?;

        if !status.success() {
            tracing::warn!("`{}` exited with code {:?}", line, status.code());
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessLauncher for ComposeLauncher {
    async fn start(&self) -> Result<()> {
        self.invoke("up -d").await
    }

    async fn stop(&self) -> Result<()> {
        self.invoke("stop").await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verbs_are_appended_to_command() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("verbs.log");
        let launcher = ComposeLauncher::new(format!("echo >> {}", log.display()));

        launcher.start().await.unwrap();
        launcher.stop().await.unwrap();

        let logged = std::fs::read_to_string(&log).unwrap();
        assert_eq!(logged, "up -d\nstop\n");
    }

    #[tokio::test]
    async fn test_failing_command_is_not_fatal() {
        let launcher = ComposeLauncher::new("false");
        assert!(launcher.start().await.is_ok());
        assert!(launcher.stop().await.is_ok());
    }
}
