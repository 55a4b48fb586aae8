use serde::{Deserialize, Serialize};

/// Lifecycle state of a managed game server.
///
/// The orchestrator is the sole writer of a server's status. Legal
/// transitions:
///
/// ```text
/// Unknown -> Installing -> Stopped <-> {Loading | Resuming} -> Running -> Stopping -> Stopped
/// ```
///
/// `ForceStop` moves any non-terminal state directly to [`Stopped`],
/// bypassing graceful shutdown. [`Errored`] is reachable from every state on
/// unrecoverable failure and only leaves via force-stop or a reinstall.
///
/// [`Stopped`]: ServerStatus::Stopped
/// [`Errored`]: ServerStatus::Errored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerStatus {
    /// No process has ever been observed for this server.
    Unknown,
    /// An install or update of the server binary is in progress.
    Installing,
    /// The server process is not running.
    Stopped,
    /// A save file is being loaded into a fresh process.
    Loading,
    /// The most recent temp save is being resumed.
    Resuming,
    /// The server process is running and accepting players.
    Running,
    /// A graceful shutdown was requested and is in progress.
    Stopping,
    /// An unrecoverable failure occurred; operator action required.
    Errored,
}

impl ServerStatus {
    /// True when a start-style operation (resume, load, start-scenario) may
    /// begin from this state.
    pub fn can_start(self) -> bool {
        matches!(self, ServerStatus::Unknown | ServerStatus::Stopped)
    }

    /// True when a graceful stop may begin from this state.
    pub fn can_stop(self) -> bool {
        matches!(self, ServerStatus::Running)
    }

    /// True when a force-stop is meaningful: any state that is not already
    /// terminal.
    pub fn can_force_stop(self) -> bool {
        !matches!(self, ServerStatus::Stopped | ServerStatus::Unknown)
    }

    /// True when an install may begin from this state. Errored servers are
    /// deliberately installable so a reinstall is the recovery path.
    pub fn can_install(self) -> bool {
        matches!(
            self,
            ServerStatus::Unknown | ServerStatus::Stopped | ServerStatus::Errored
        )
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServerStatus::Unknown => "unknown",
            ServerStatus::Installing => "installing",
            ServerStatus::Stopped => "stopped",
            ServerStatus::Loading => "loading",
            ServerStatus::Resuming => "resuming",
            ServerStatus::Running => "running",
            ServerStatus::Stopping => "stopping",
            ServerStatus::Errored => "errored",
        };
        write!(f, "{s}")
    }
}
