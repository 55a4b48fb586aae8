//! External process driver seam
//!
//! The real game binary, its wrapper process, and their wire protocol are
//! external collaborators. The orchestrator only needs this trait: each
//! method performs one long-running action against a server's process and
//! reports success or failure. Implementations must be cancel-safe; the
//! orchestrator abandons an action that exceeds its timeout.

use async_trait::async_trait;
use garrison_types::ServerId;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("process action failed: {0}")]
    Failed(String),

    #[error("process is not reachable")]
    Unreachable,
}

/// Commands the orchestrator issues to a server's external process.
#[async_trait]
pub trait ProcessDriver: Send + Sync {
    /// Starts the process resuming from its most recent temp save.
    async fn resume(&self, server: &ServerId) -> Result<(), DriverError>;

    /// Starts the process loading the given save file.
    async fn load(&self, server: &ServerId, save_file: &Path) -> Result<(), DriverError>;

    /// Starts the process on a named scenario package.
    async fn start_scenario(&self, server: &ServerId, scenario: &str) -> Result<(), DriverError>;

    /// Requests a graceful shutdown and waits for the process to exit.
    async fn stop(&self, server: &ServerId) -> Result<(), DriverError>;

    /// Kills the process without waiting for a graceful shutdown.
    async fn force_stop(&self, server: &ServerId) -> Result<(), DriverError>;

    /// Installs or updates the server binary to the given version.
    async fn install(&self, server: &ServerId, version: &str) -> Result<(), DriverError>;

    /// Asks the running process to write a named save.
    async fn save(&self, server: &ServerId, save_name: &str) -> Result<(), DriverError>;
}
