use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Extension enforced for save files at the boundary.
pub const SAVE_EXTENSION: &str = "zip";

/// Extension enforced for log files at the boundary.
pub const LOG_EXTENSION: &str = "log";

/// The closed set of logical file directories.
///
/// Every file operation is routed through one of these categories; there is
/// no way to address an arbitrary path. Local saves, temp saves, logs, and
/// chat logs live under a per-server subdirectory; global saves and
/// scenarios are process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectoryKind {
    GlobalSaves,
    LocalSaves,
    TempSaves,
    Logs,
    ChatLogs,
    Scenarios,
}

impl DirectoryKind {
    /// On-disk directory name for this category.
    pub fn dir_name(self) -> &'static str {
        match self {
            DirectoryKind::GlobalSaves => "global_saves",
            DirectoryKind::LocalSaves => "local_saves",
            DirectoryKind::TempSaves => "temp_saves",
            DirectoryKind::Logs => "logs",
            DirectoryKind::ChatLogs => "chat_logs",
            DirectoryKind::Scenarios => "scenarios",
        }
    }

    /// Parses an on-disk directory name back into a category.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "global_saves" => Some(DirectoryKind::GlobalSaves),
            "local_saves" => Some(DirectoryKind::LocalSaves),
            "temp_saves" => Some(DirectoryKind::TempSaves),
            "logs" => Some(DirectoryKind::Logs),
            "chat_logs" => Some(DirectoryKind::ChatLogs),
            "scenarios" => Some(DirectoryKind::Scenarios),
            _ => None,
        }
    }

    /// True for categories namespaced under a per-server subdirectory.
    pub fn is_server_scoped(self) -> bool {
        matches!(
            self,
            DirectoryKind::LocalSaves
                | DirectoryKind::TempSaves
                | DirectoryKind::Logs
                | DirectoryKind::ChatLogs
        )
    }

    /// True for the three save categories whose contents are tracked for
    /// change notification. Moves into an untracked destination succeed but
    /// raise no change event.
    pub fn is_tracked(self) -> bool {
        matches!(
            self,
            DirectoryKind::GlobalSaves | DirectoryKind::LocalSaves | DirectoryKind::TempSaves
        )
    }
}

impl std::fmt::Display for DirectoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Immutable snapshot of a managed file, taken at the moment of inspection.
///
/// Any change to the underlying file produces a new snapshot; records are
/// never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetaData {
    /// File name including extension.
    pub name: String,
    /// Logical directory tag, e.g. `"1/local_saves"` or `"global_saves"`.
    pub directory: String,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
    /// Size in bytes.
    pub size: u64,
}

/// Immutable snapshot of a directory-backed scenario package.
///
/// Scenarios are directories, not single files, so there is no size field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioMetaData {
    pub name: String,
    pub created_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
}
