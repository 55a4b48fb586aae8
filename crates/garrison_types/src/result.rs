use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-visible error categories.
///
/// Remote callers only ever see these keys plus a detail string; raw I/O
/// faults are logged server-side and surfaced as [`FileError`] with a
/// generic message.
///
/// [`FileError`]: ErrorKey::FileError
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKey {
    /// Unknown directory category, or a path that failed sandbox
    /// resolution. The two causes are deliberately indistinguishable to the
    /// caller.
    InvalidDirectory,
    /// Empty, whitespace-only, or space-containing file name.
    InvalidFileName,
    FileAlreadyExists,
    MissingFile,
    UnknownServer,
    /// Lifecycle operation refused because the server's current status does
    /// not permit it.
    InvalidState,
    /// Catch-all for unexpected I/O faults.
    FileError,
}

impl std::fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKey::InvalidDirectory => "invalid_directory",
            ErrorKey::InvalidFileName => "invalid_file_name",
            ErrorKey::FileAlreadyExists => "file_already_exists",
            ErrorKey::MissingFile => "missing_file",
            ErrorKey::UnknownServer => "unknown_server",
            ErrorKey::InvalidState => "invalid_state",
            ErrorKey::FileError => "file_error",
        };
        write!(f, "{s}")
    }
}

/// One `{key, detail}` error entry in an operation result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{key}: {detail}")]
pub struct OpError {
    pub key: ErrorKey,
    pub detail: String,
}

impl OpError {
    pub fn new(key: ErrorKey, detail: impl Into<String>) -> Self {
        Self {
            key,
            detail: detail.into(),
        }
    }
}

/// Uniform result returned by every remote-facing operation.
///
/// Batch operations aggregate per-item failures here; a partially successful
/// batch reports `success == false` while the succeeding items' side effects
/// stand. Callers must not assume all-or-nothing semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpResult {
    pub success: bool,
    pub errors: Vec<OpError>,
}

impl OpResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn failure(error: OpError) -> Self {
        Self {
            success: false,
            errors: vec![error],
        }
    }

    /// Builds a result from accumulated batch errors: ok when empty.
    pub fn from_errors(errors: Vec<OpError>) -> Self {
        Self {
            success: errors.is_empty(),
            errors,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.success
    }
}
