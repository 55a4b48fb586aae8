//! Scenario refresh on repository push
//!
//! Scenario packages live in a git repository; a push notification carries
//! a ref like `refs/heads/main`. The refresher extracts the branch, runs
//! the deploy script for it in the background, and republishes the scenario
//! catalogue on success. Failures and timeouts are logged and publish
//! nothing, leaving the previous catalogue in force.

use garrison_files::FileManager;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

/// Refs shorter than `refs/heads/x` cannot name a branch.
const REF_HEADS_PREFIX: &str = "refs/heads/";

const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(300);

/// Extracts the branch name from a push ref. Returns `None` for refs that
/// do not name a branch (tags, malformed refs).
pub fn branch_from_ref(git_ref: &str) -> Option<&str> {
    let branch = git_ref.strip_prefix(REF_HEADS_PREFIX)?;
    if branch.is_empty() {
        return None;
    }
    Some(branch)
}

/// Runs the scenario deploy script in response to push notifications.
pub struct ScenarioRefresher {
    script: PathBuf,
    files: Arc<FileManager>,
    refresh_timeout: Duration,
}

impl ScenarioRefresher {
    pub fn new(script: impl Into<PathBuf>, files: Arc<FileManager>) -> Self {
        Self {
            script: script.into(),
            files,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    pub fn with_refresh_timeout(mut self, refresh_timeout: Duration) -> Self {
        self.refresh_timeout = refresh_timeout;
        self
    }

    /// Handles one push notification. The deploy runs as a background task;
    /// this returns immediately so the notification source is never blocked.
    pub fn handle_push(self: &Arc<Self>, git_ref: &str) {
        let Some(branch) = branch_from_ref(git_ref) else {
            info!(git_ref, "ignoring push to non-branch ref");
            return;
        };
        let branch = branch.to_string();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.refresh(&branch).await;
        });
    }

    /// Runs the deploy script for one branch and, on success, republishes
    /// the scenario catalogue.
    pub async fn refresh(&self, branch: &str) {
        info!(branch, script = %self.script.display(), "refreshing scenarios");

        let run = tokio::process::Command::new(&self.script)
            .arg(branch)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        let output = match timeout(self.refresh_timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!(branch, "failed to run scenario deploy script: {e}");
                return;
            }
            Err(_) => {
                error!(branch, "scenario deploy timed out after {:?}", self.refresh_timeout);
                return;
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(branch, status = %output.status, "scenario deploy failed: {}", stderr.trim());
            return;
        }

        info!(branch, "scenario deploy finished");
        self.files.notify_scenarios_changed().await;
    }
}

impl std::fmt::Debug for ScenarioRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRefresher")
            .field("script", &self.script)
            .field("refresh_timeout", &self.refresh_timeout)
            .finish()
    }
}
