//! The server lifecycle orchestrator
//!
//! Sole writer of server status. Every operation validates the server id,
//! takes that server's lock for the status check-and-transition, then
//! releases it before any long-running driver action so concurrent status
//! reads and operations on other servers proceed unblocked. Each status
//! change is published exactly once.

use crate::process::{DriverError, ProcessDriver};
use crate::registry::{ServerHandle, ServerRegistry};
use crate::settings::{
    read_json_or_default, write_json_atomic, EditableServerSettings, ExtraServerSettings,
    EXTRA_SETTINGS_FILE, SETTINGS_FILE,
};
use chrono::Utc;
use garrison_files::FileManager;
use garrison_types::{ErrorKey, OpError, OpResult, ServerId, ServerStatus, StatusChange};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Long-running external actions (install, scenario deploy, resume) are
/// abandoned after this long; the call reports failure and does not retry.
const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(300);

const STATUS_CHANNEL_CAPACITY: usize = 64;

/// Owns the per-server state machine and serializes lifecycle commands
/// through each server's lock.
pub struct ServerOrchestrator {
    registry: Arc<ServerRegistry>,
    files: Arc<FileManager>,
    driver: Arc<dyn ProcessDriver>,
    status_changes: broadcast::Sender<StatusChange>,
    action_timeout: Duration,
}

impl ServerOrchestrator {
    pub fn new(
        registry: Arc<ServerRegistry>,
        files: Arc<FileManager>,
        driver: Arc<dyn ProcessDriver>,
    ) -> Self {
        Self {
            registry,
            files,
            driver,
            status_changes: broadcast::channel(STATUS_CHANNEL_CAPACITY).0,
            action_timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }

    pub fn with_action_timeout(mut self, action_timeout: Duration) -> Self {
        self.action_timeout = action_timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    pub fn files(&self) -> &Arc<FileManager> {
        &self.files
    }

    pub fn is_valid_server_id(&self, server_id: &ServerId) -> bool {
        self.registry.is_valid_server_id(server_id)
    }

    pub fn subscribe_status_changes(&self) -> broadcast::Receiver<StatusChange> {
        self.status_changes.subscribe()
    }

    pub async fn get_status(&self, server_id: &ServerId) -> Option<ServerStatus> {
        let handle = self.registry.get(server_id)?;
        let state = handle.lock().await;
        Some(state.status)
    }

    // ========================================================================
    // Lifecycle commands
    // ========================================================================

    /// Resumes the most recent temp save.
    pub async fn resume(&self, server_id: &ServerId, user_name: &str) -> OpResult {
        let handle = match self.handle(server_id) {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        if let Err(result) = self
            .begin(&handle, |s| s.can_start(), ServerStatus::Resuming)
            .await
        {
            return result;
        }
        info!(server_id = %server_id, user = user_name, "resuming server");

        let outcome = self.run_driver(self.driver.resume(server_id)).await;
        self.finish(&handle, outcome, ServerStatus::Running).await
    }

    /// Loads a named save file from one of the save directories.
    pub async fn load(
        &self,
        server_id: &ServerId,
        directory: &str,
        file_name: &str,
        user_name: &str,
    ) -> OpResult {
        let handle = match self.handle(server_id) {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        // Validate before any state is touched.
        let save_path = match self.files.get_save_file(server_id, directory, file_name).await {
            Some(path) => path,
            None => {
                return OpResult::failure(OpError::new(
                    ErrorKey::MissingFile,
                    format!("File {directory}/{file_name} not found."),
                ))
            }
        };

        if let Err(result) = self
            .begin(&handle, |s| s.can_start(), ServerStatus::Loading)
            .await
        {
            return result;
        }
        info!(server_id = %server_id, user = user_name, file = file_name, "loading save");

        let outcome = self.run_driver(self.driver.load(server_id, &save_path)).await;
        self.finish(&handle, outcome, ServerStatus::Running).await
    }

    /// Starts a named scenario package.
    pub async fn start_scenario(
        &self,
        server_id: &ServerId,
        scenario_name: &str,
        user_name: &str,
    ) -> OpResult {
        let handle = match self.handle(server_id) {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let exists = self
            .files
            .get_scenarios()
            .await
            .iter()
            .any(|s| s.name == scenario_name);
        if !exists {
            return OpResult::failure(OpError::new(
                ErrorKey::MissingFile,
                format!("Scenario {scenario_name} not found."),
            ));
        }

        if let Err(result) = self
            .begin(&handle, |s| s.can_start(), ServerStatus::Loading)
            .await
        {
            return result;
        }
        info!(server_id = %server_id, user = user_name, scenario = scenario_name, "starting scenario");

        let outcome = self
            .run_driver(self.driver.start_scenario(server_id, scenario_name))
            .await;
        self.finish(&handle, outcome, ServerStatus::Running).await
    }

    /// Requests a graceful shutdown.
    pub async fn stop(&self, server_id: &ServerId, user_name: &str) -> OpResult {
        let handle = match self.handle(server_id) {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        if let Err(result) = self
            .begin(&handle, |s| s.can_stop(), ServerStatus::Stopping)
            .await
        {
            return result;
        }
        info!(server_id = %server_id, user = user_name, "stopping server");

        let outcome = self.run_driver(self.driver.stop(server_id)).await;
        self.finish(&handle, outcome, ServerStatus::Stopped).await
    }

    /// Kills the process from any state, bypassing graceful shutdown. This
    /// is the operator's way out of [`ServerStatus::Errored`]; the server
    /// always ends up stopped even when the driver reports failure.
    pub async fn force_stop(&self, server_id: &ServerId, user_name: &str) -> OpResult {
        let handle = match self.handle(server_id) {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        {
            let state = handle.lock().await;
            if !state.status.can_force_stop() {
                // Already stopped (or never started); nothing to kill.
                return OpResult::ok();
            }
        }
        warn!(server_id = %server_id, user = user_name, "force stopping server");

        let outcome = self.run_driver(self.driver.force_stop(server_id)).await;

        let mut state = handle.lock().await;
        self.change_status(&handle, &mut state, ServerStatus::Stopped);
        match outcome {
            Ok(()) => OpResult::ok(),
            Err(e) => OpResult::failure(e),
        }
    }

    /// Installs the given version. A successful install records the version
    /// and leaves the server stopped.
    pub async fn install(&self, server_id: &ServerId, user_name: &str, version: &str) -> OpResult {
        let handle = match self.handle(server_id) {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        if let Err(result) = self
            .begin(&handle, |s| s.can_install(), ServerStatus::Installing)
            .await
        {
            return result;
        }
        info!(server_id = %server_id, user = user_name, version, "installing server");

        let outcome = self.run_driver(self.driver.install(server_id, version)).await;

        let mut state = handle.lock().await;
        match outcome {
            Ok(()) => {
                state.version = Some(version.to_string());
                self.change_status(&handle, &mut state, ServerStatus::Stopped);
                OpResult::ok()
            }
            Err(e) => {
                self.change_status(&handle, &mut state, ServerStatus::Errored);
                OpResult::failure(e)
            }
        }
    }

    /// Asks a running server to write a named save. No status change.
    pub async fn save(&self, server_id: &ServerId, user_name: &str, save_name: &str) -> OpResult {
        let handle = match self.handle(server_id) {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        if save_name.trim().is_empty() || save_name.contains(' ') {
            return OpResult::failure(OpError::new(ErrorKey::InvalidFileName, save_name));
        }

        {
            let state = handle.lock().await;
            if state.status != ServerStatus::Running {
                return OpResult::failure(OpError::new(
                    ErrorKey::InvalidState,
                    format!("cannot save while {}.", state.status),
                ));
            }
        }
        info!(server_id = %server_id, user = user_name, save = save_name, "saving game");

        match self.run_driver(self.driver.save(server_id, save_name)).await {
            Ok(()) => OpResult::ok(),
            Err(e) => OpResult::failure(e),
        }
    }

    // ========================================================================
    // Server-scoped state
    // ========================================================================

    pub async fn get_editable_server_settings(
        &self,
        server_id: &ServerId,
    ) -> Option<EditableServerSettings> {
        let handle = self.registry.get(server_id)?;
        let state = handle.lock().await;
        Some(state.settings.clone())
    }

    pub async fn save_editable_server_settings(
        &self,
        server_id: &ServerId,
        settings: EditableServerSettings,
    ) -> OpResult {
        let handle = match self.handle(server_id) {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let path = self.files.sandbox().server_root(server_id).join(SETTINGS_FILE);
        let mut state = handle.lock().await;
        if let Err(e) = write_json_atomic(&path, &settings).await {
            error!(server_id = %server_id, "failed to persist settings: {e}");
            return OpResult::failure(OpError::new(
                ErrorKey::FileError,
                "Error saving settings.",
            ));
        }
        state.settings = settings;
        OpResult::ok()
    }

    pub async fn get_extra_server_settings(
        &self,
        server_id: &ServerId,
    ) -> Option<ExtraServerSettings> {
        let handle = self.registry.get(server_id)?;
        let state = handle.lock().await;
        Some(state.extra_settings.clone())
    }

    pub async fn save_extra_server_settings(
        &self,
        server_id: &ServerId,
        settings: ExtraServerSettings,
    ) -> OpResult {
        let handle = match self.handle(server_id) {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let path = self
            .files
            .sandbox()
            .server_root(server_id)
            .join(EXTRA_SETTINGS_FILE);
        let mut state = handle.lock().await;
        if let Err(e) = write_json_atomic(&path, &settings).await {
            error!(server_id = %server_id, "failed to persist extra settings: {e}");
            return OpResult::failure(OpError::new(
                ErrorKey::FileError,
                "Error saving settings.",
            ));
        }
        state.extra_settings = settings;
        OpResult::ok()
    }

    pub async fn get_version(&self, server_id: &ServerId) -> Option<String> {
        let handle = self.registry.get(server_id)?;
        let state = handle.lock().await;
        state.version.clone()
    }

    pub async fn get_mod_pack(&self, server_id: &ServerId) -> Option<String> {
        let handle = self.registry.get(server_id)?;
        let state = handle.lock().await;
        state.mod_pack.clone()
    }

    pub async fn set_mod_pack(&self, server_id: &ServerId, mod_pack: Option<String>) -> OpResult {
        let handle = match self.handle(server_id) {
            Ok(handle) => handle,
            Err(result) => return result,
        };
        let mut state = handle.lock().await;
        state.mod_pack = mod_pack;
        OpResult::ok()
    }

    /// Loads persisted settings for every registered server. Run once at
    /// startup, before commands are accepted.
    pub async fn hydrate_settings(&self) {
        for id in self.registry.ids() {
            let Some(handle) = self.registry.get(&id) else {
                continue;
            };
            let root = self.files.sandbox().server_root(&id);

            let settings = read_json_or_default(&root.join(SETTINGS_FILE)).await;
            let extra = read_json_or_default(&root.join(EXTRA_SETTINGS_FILE)).await;

            let mut state = handle.lock().await;
            match settings {
                Ok(settings) => state.settings = settings,
                Err(e) => error!(server_id = %id, "failed to load settings: {e}"),
            }
            match extra {
                Ok(extra) => state.extra_settings = extra,
                Err(e) => error!(server_id = %id, "failed to load extra settings: {e}"),
            }
        }
    }

    /// Publishes temp saves modified since the last sweep, then advances the
    /// watermark. The timestamp read-and-advance holds the server lock; the
    /// listing and publish do not.
    pub async fn raise_recent_temp_files(&self, server_id: &ServerId) -> OpResult {
        let handle = match self.handle(server_id) {
            Ok(handle) => handle,
            Err(result) => return result,
        };

        let since = {
            let mut state = handle.lock().await;
            let since = state.last_temp_files_checked;
            state.last_temp_files_checked = Utc::now();
            since
        };

        self.files.publish_recent_temp_saves(server_id, since).await;
        OpResult::ok()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn handle(&self, server_id: &ServerId) -> Result<Arc<ServerHandle>, OpResult> {
        self.registry.get(server_id).ok_or_else(|| {
            OpResult::failure(OpError::new(
                ErrorKey::UnknownServer,
                format!("Server {server_id} does not exist."),
            ))
        })
    }

    /// Checks the current status under the lock and enters the transient
    /// state. The lock is released on return so the following driver action
    /// never blocks other readers.
    async fn begin(
        &self,
        handle: &ServerHandle,
        permitted: impl Fn(ServerStatus) -> bool,
        transient: ServerStatus,
    ) -> Result<(), OpResult> {
        let mut state = handle.lock().await;
        if !permitted(state.status) {
            return Err(OpResult::failure(OpError::new(
                ErrorKey::InvalidState,
                format!("operation not allowed while {}.", state.status),
            )));
        }
        self.change_status(handle, &mut state, transient);
        Ok(())
    }

    /// Records the outcome of a driver action: the success status on ok, or
    /// errored on failure.
    async fn finish(
        &self,
        handle: &ServerHandle,
        outcome: Result<(), OpError>,
        success_status: ServerStatus,
    ) -> OpResult {
        let mut state = handle.lock().await;
        match outcome {
            Ok(()) => {
                self.change_status(handle, &mut state, success_status);
                OpResult::ok()
            }
            Err(e) => {
                self.change_status(handle, &mut state, ServerStatus::Errored);
                OpResult::failure(e)
            }
        }
    }

    /// Updates status and publishes the change exactly once. A no-op when
    /// the status is unchanged.
    fn change_status(
        &self,
        handle: &ServerHandle,
        state: &mut crate::registry::ServerState,
        new_status: ServerStatus,
    ) {
        let old_status = state.status;
        if old_status == new_status {
            return;
        }
        state.status = new_status;
        info!(server_id = %handle.id(), %old_status, %new_status, "server status changed");

        let _ = self.status_changes.send(StatusChange {
            server_id: handle.id().clone(),
            new_status,
            old_status,
            timestamp: Utc::now(),
        });
    }

    /// Runs one driver action under the configured timeout. Timeouts
    /// abandon the action and report failure; there is no automatic retry.
    async fn run_driver<F>(&self, action: F) -> Result<(), OpError>
    where
        F: Future<Output = Result<(), DriverError>>,
    {
        match timeout(self.action_timeout, action).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("driver action failed: {e}");
                Err(OpError::new(ErrorKey::FileError, "Server action failed."))
            }
            Err(_) => {
                error!("driver action timed out after {:?}", self.action_timeout);
                Err(OpError::new(ErrorKey::FileError, "Server action timed out."))
            }
        }
    }
}

impl std::fmt::Debug for ServerOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerOrchestrator")
            .field("action_timeout", &self.action_timeout)
            .finish()
    }
}
