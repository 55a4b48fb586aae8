//! Process driver backed by an operator-supplied wrapper command
//!
//! Each lifecycle action shells out to the configured executable as
//! `<command> <action> <server-id> [args...]`; a non-zero exit is a driver
//! failure. This keeps the daemon decoupled from any particular game
//! binary or wrapper protocol.

use async_trait::async_trait;
use garrison_server::{DriverError, ProcessDriver, VersionSource};
use garrison_types::ServerId;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{debug, error};

pub struct CommandDriver {
    command: PathBuf,
}

impl CommandDriver {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn run(
        &self,
        action: &str,
        server: &ServerId,
        extra: &[&OsStr],
    ) -> Result<(), DriverError> {
        debug!(action, server_id = %server, command = %self.command.display(), "running wrapper");

        let output = tokio::process::Command::new(&self.command)
            .arg(action)
            .arg(server.as_str())
            .args(extra)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                error!(action, server_id = %server, "failed to spawn wrapper: {e}");
                DriverError::Unreachable
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(DriverError::Failed(format!(
                "{action} exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}

#[async_trait]
impl ProcessDriver for CommandDriver {
    async fn resume(&self, server: &ServerId) -> Result<(), DriverError> {
        self.run("resume", server, &[]).await
    }

    async fn load(&self, server: &ServerId, save_file: &Path) -> Result<(), DriverError> {
        self.run("load", server, &[save_file.as_os_str()]).await
    }

    async fn start_scenario(&self, server: &ServerId, scenario: &str) -> Result<(), DriverError> {
        self.run("start-scenario", server, &[OsStr::new(scenario)])
            .await
    }

    async fn stop(&self, server: &ServerId) -> Result<(), DriverError> {
        self.run("stop", server, &[]).await
    }

    async fn force_stop(&self, server: &ServerId) -> Result<(), DriverError> {
        self.run("force-stop", server, &[]).await
    }

    async fn install(&self, server: &ServerId, version: &str) -> Result<(), DriverError> {
        self.run("install", server, &[OsStr::new(version)]).await
    }

    async fn save(&self, server: &ServerId, save_name: &str) -> Result<(), DriverError> {
        self.run("save", server, &[OsStr::new(save_name)]).await
    }
}

/// The wrapper command also answers `list-versions`, printing one
/// downloadable version per line.
#[async_trait]
impl VersionSource for CommandDriver {
    async fn downloadable_versions(&self) -> io::Result<Vec<String>> {
        let output = tokio::process::Command::new(&self.command)
            .arg("list-versions")
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(io::Error::other(format!(
                "list-versions exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("wrapper.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn successful_command_is_ok() {
        let dir = tempdir().unwrap();
        let script = write_script(dir.path(), "exit 0");

        let driver = CommandDriver::new(script);
        assert!(driver.resume(&ServerId::new("1")).await.is_ok());
    }

    #[tokio::test]
    async fn failing_command_carries_stderr() {
        let dir = tempdir().unwrap();
        let script = write_script(dir.path(), "echo boom >&2; exit 1");

        let driver = CommandDriver::new(script);
        let err = driver.stop(&ServerId::new("1")).await.unwrap_err();
        match err {
            DriverError::Failed(msg) => assert!(msg.contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_command_is_unreachable() {
        let driver = CommandDriver::new("/nonexistent/wrapper");
        let err = driver.resume(&ServerId::new("1")).await.unwrap_err();
        assert!(matches!(err, DriverError::Unreachable));
    }
}
