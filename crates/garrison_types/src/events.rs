use crate::{FileMetaData, ScenarioMetaData, ServerId, ServerStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of change described by a file or scenario event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Create,
    Delete,
    Rename,
}

/// Notification that files in one logical category changed.
///
/// For `Create` only `new_files` is populated, for `Delete` only
/// `old_files`; a `Rename` carries both, paired by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesChangedEvent {
    /// Owning server, or the global scope for process-wide directories.
    pub server_id: ServerId,
    pub kind: ChangeKind,
    pub new_files: Vec<FileMetaData>,
    pub old_files: Vec<FileMetaData>,
}

impl FilesChangedEvent {
    pub fn created(server_id: ServerId, new_files: Vec<FileMetaData>) -> Self {
        Self {
            server_id,
            kind: ChangeKind::Create,
            new_files,
            old_files: Vec::new(),
        }
    }

    pub fn deleted(server_id: ServerId, old_files: Vec<FileMetaData>) -> Self {
        Self {
            server_id,
            kind: ChangeKind::Delete,
            new_files: Vec::new(),
            old_files,
        }
    }

    /// A rename event pairing old and new metadata by index.
    pub fn renamed(
        server_id: ServerId,
        new_files: Vec<FileMetaData>,
        old_files: Vec<FileMetaData>,
    ) -> Self {
        debug_assert_eq!(new_files.len(), old_files.len());
        Self {
            server_id,
            kind: ChangeKind::Rename,
            new_files,
            old_files,
        }
    }
}

/// Notification that the scenario catalogue changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenariosChangedEvent {
    pub kind: ChangeKind,
    pub scenarios: Vec<ScenarioMetaData>,
}

/// A server status transition, published exactly once per change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub server_id: ServerId,
    pub new_status: ServerStatus,
    pub old_status: ServerStatus,
    pub timestamp: DateTime<Utc>,
}
