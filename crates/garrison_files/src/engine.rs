//! File management operations over the sandbox
//!
//! Implements the upload/delete/move/copy/rename surface plus the read-only
//! queries. Batch operations never abort on the first failure: every item is
//! attempted, per-item errors are aggregated, and the succeeding items' side
//! effects (file written, event published) stand.
//!
//! Unexpected I/O faults are caught at the per-item boundary, logged with
//! full detail, and surfaced to the caller as a generic file error only.

use crate::metadata;
use crate::notifier::FileNotifier;
use crate::sandbox::{PathSandbox, ResolvedDirectory, SandboxError, CURRENT_LOG_FILE};
use chrono::{DateTime, Utc};
use garrison_types::{
    ChangeKind, DirectoryKind, ErrorKey, FileMetaData, FilesChangedEvent, LOG_EXTENSION, OpError,
    OpResult, SAVE_EXTENSION, ScenariosChangedEvent, ServerId,
};
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, error, warn};

/// One file in an upload batch: a target name plus a byte stream.
pub struct FileUpload {
    pub name: String,
    pub content: Box<dyn AsyncRead + Send + Unpin>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, content: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            name: name.into(),
            content: Box::new(content),
        }
    }
}

impl std::fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileUpload").field("name", &self.name).finish()
    }
}

/// The file management engine.
///
/// Operations are keyed by path, not by the per-server lifecycle lock;
/// concurrent operations touching the same file may race, and callers must
/// tolerate a benign `FileAlreadyExists` or `MissingFile` from such a race.
#[derive(Debug)]
pub struct FileManager {
    sandbox: Arc<PathSandbox>,
    notifier: Arc<FileNotifier>,
}

impl FileManager {
    pub fn new(sandbox: Arc<PathSandbox>, notifier: Arc<FileNotifier>) -> Self {
        Self { sandbox, notifier }
    }

    pub fn sandbox(&self) -> &Arc<PathSandbox> {
        &self.sandbox
    }

    pub fn notifier(&self) -> &Arc<FileNotifier> {
        &self.notifier
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_temp_save_files(&self, server_id: &ServerId) -> Vec<FileMetaData> {
        self.list_save_directory(server_id, DirectoryKind::TempSaves)
            .await
    }

    pub async fn get_local_save_files(&self, server_id: &ServerId) -> Vec<FileMetaData> {
        self.list_save_directory(server_id, DirectoryKind::LocalSaves)
            .await
    }

    pub async fn get_global_save_files(&self) -> Vec<FileMetaData> {
        self.list_save_directory(&ServerId::global(), DirectoryKind::GlobalSaves)
            .await
    }

    /// Lists a server's logs: the live log first (when present), then
    /// rotated logs newest-first.
    pub async fn get_logs(&self, server_id: &ServerId) -> Vec<FileMetaData> {
        let mut logs = Vec::new();

        let current = self.sandbox.current_log_path(server_id);
        if let Ok(snapshot) = metadata::file_snapshot(&current, server_id.as_str()).await {
            logs.push(snapshot);
        }

        match self
            .sandbox
            .resolve_directory(server_id, DirectoryKind::Logs.dir_name())
            .await
        {
            Ok(dir) => match metadata::list_files_with_extension(&dir.path, &dir.tag, LOG_EXTENSION).await
            {
                Ok(mut rotated) => {
                    rotated.sort_by(|a, b| b.created_time.cmp(&a.created_time));
                    logs.extend(rotated);
                }
                Err(e) => error!(server_id = %server_id, "failed to list logs: {e}"),
            },
            Err(e) => debug!(server_id = %server_id, "log directory unavailable: {e}"),
        }

        logs
    }

    pub async fn get_chat_logs(&self, server_id: &ServerId) -> Vec<FileMetaData> {
        match self
            .sandbox
            .resolve_directory(server_id, DirectoryKind::ChatLogs.dir_name())
            .await
        {
            Ok(dir) => match metadata::list_files_with_extension(&dir.path, &dir.tag, LOG_EXTENSION).await
            {
                Ok(mut logs) => {
                    logs.sort_by(|a, b| b.created_time.cmp(&a.created_time));
                    logs
                }
                Err(e) => {
                    error!(server_id = %server_id, "failed to list chat logs: {e}");
                    Vec::new()
                }
            },
            Err(e) => {
                debug!(server_id = %server_id, "chat log directory unavailable: {e}");
                Vec::new()
            }
        }
    }

    pub async fn get_scenarios(&self) -> Vec<garrison_types::ScenarioMetaData> {
        match self
            .sandbox
            .resolve_directory(&ServerId::global(), DirectoryKind::Scenarios.dir_name())
            .await
        {
            Ok(dir) => match metadata::list_scenarios(&dir.path).await {
                Ok(scenarios) => scenarios,
                Err(e) => {
                    error!("failed to list scenarios: {e}");
                    Vec::new()
                }
            },
            Err(e) => {
                error!("scenario directory unavailable: {e}");
                Vec::new()
            }
        }
    }

    /// Locates a rotated or live log file for download. Returns `None` for
    /// anything that is not an existing `.log` file in a log location,
    /// without revealing why.
    pub async fn get_log_file(&self, directory: &str, file_name: &str) -> Option<PathBuf> {
        // The live log sits at the server root, addressed by bare server id.
        let as_server = ServerId::new(directory);
        if self.sandbox.is_valid_server_id(&as_server) && file_name == CURRENT_LOG_FILE {
            let path = self.sandbox.current_log_path(&as_server);
            return tokio::fs::try_exists(&path).await.unwrap_or(false).then_some(path);
        }

        self.get_extension_checked_file(directory, file_name, DirectoryKind::Logs, LOG_EXTENSION)
            .await
    }

    pub async fn get_chat_log_file(&self, directory: &str, file_name: &str) -> Option<PathBuf> {
        self.get_extension_checked_file(directory, file_name, DirectoryKind::ChatLogs, LOG_EXTENSION)
            .await
    }

    /// Locates a save file for download in one of the three save categories.
    pub async fn get_save_file(
        &self,
        server_id: &ServerId,
        directory: &str,
        file_name: &str,
    ) -> Option<PathBuf> {
        let dir = self.resolve_save_directory(server_id, directory).await.ok()?;
        let path = self.sandbox.safe_file_path(&dir.path, file_name).ok()?;
        if path.extension().and_then(OsStr::to_str) != Some(SAVE_EXTENSION) {
            return None;
        }
        tokio::fs::try_exists(&path).await.unwrap_or(false).then_some(path)
    }

    async fn get_extension_checked_file(
        &self,
        directory: &str,
        file_name: &str,
        expected_kind: DirectoryKind,
        extension: &str,
    ) -> Option<PathBuf> {
        let dir = self
            .sandbox
            .resolve_directory(&ServerId::global(), directory)
            .await
            .ok()?;
        if dir.kind != expected_kind {
            return None;
        }
        let path = self.sandbox.safe_file_path(&dir.path, file_name).ok()?;
        if path.extension().and_then(OsStr::to_str) != Some(extension) {
            return None;
        }
        tokio::fs::try_exists(&path).await.unwrap_or(false).then_some(path)
    }

    async fn list_save_directory(
        &self,
        server_id: &ServerId,
        kind: DirectoryKind,
    ) -> Vec<FileMetaData> {
        match self.sandbox.resolve_directory(server_id, kind.dir_name()).await {
            Ok(dir) => {
                match metadata::list_files_with_extension(&dir.path, &dir.tag, SAVE_EXTENSION).await
                {
                    Ok(files) => files,
                    Err(e) => {
                        error!(directory = %kind, "failed to list save files: {e}");
                        Vec::new()
                    }
                }
            }
            Err(e) => {
                debug!(directory = %kind, "save directory unavailable: {e}");
                Vec::new()
            }
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Streams uploaded files into a server's local save directory.
    ///
    /// Each file is fsynced to disk before its metadata snapshot is taken.
    /// One Create event carries every successfully written file.
    pub async fn upload_files(&self, server_id: &ServerId, files: Vec<FileUpload>) -> OpResult {
        let dir = match self
            .resolve_save_directory(server_id, DirectoryKind::LocalSaves.dir_name())
            .await
        {
            Ok(dir) => dir,
            Err(e) => return OpResult::failure(e),
        };

        let mut created = Vec::new();
        let mut errors = Vec::new();

        for mut file in files {
            if let Err(e) = validate_file_name(&file.name) {
                errors.push(e);
                continue;
            }
            if !has_extension(&file.name, SAVE_EXTENSION) {
                errors.push(OpError::new(
                    ErrorKey::InvalidFileName,
                    format!("{} is not a {SAVE_EXTENSION} file.", file.name),
                ));
                continue;
            }

            let path = match self.sandbox.safe_file_path(&dir.path, &file.name) {
                Ok(path) => path,
                Err(e) => {
                    errors.push(surface_sandbox_error(e, &file.name));
                    continue;
                }
            };

            match write_upload(&path, &mut file.content).await {
                Ok(()) => match metadata::file_snapshot(&path, &dir.tag).await {
                    Ok(snapshot) => created.push(snapshot),
                    Err(e) => {
                        error!(name = %file.name, "failed to capture upload metadata: {e}");
                        errors.push(generic_file_error("uploading", &file.name));
                    }
                },
                Err(WriteError::AlreadyExists) => {
                    errors.push(OpError::new(
                        ErrorKey::FileAlreadyExists,
                        format!("{} already exists.", file.name),
                    ));
                }
                Err(WriteError::Io(e)) => {
                    error!(name = %file.name, "error uploading file: {e}");
                    errors.push(generic_file_error("uploading", &file.name));
                }
            }
        }

        if !created.is_empty() {
            self.notifier.publish_files(
                DirectoryKind::LocalSaves,
                FilesChangedEvent::created(server_id.clone(), created),
            );
        }

        OpResult::from_errors(errors)
    }

    /// Deletes save files given as `"{directory}/{fileName}"` paths.
    ///
    /// One Delete event is published per affected category, carrying only
    /// that category's files.
    pub async fn delete_files(&self, server_id: &ServerId, file_paths: Vec<String>) -> OpResult {
        let mut deleted = ChangeGroups::new();
        let mut errors = Vec::new();

        for file_path in &file_paths {
            let (dir, path) = match self.resolve_file_path(server_id, file_path).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            match metadata::file_snapshot(&path, &dir.tag).await {
                Ok(snapshot) => match tokio::fs::remove_file(&path).await {
                    Ok(()) => deleted.push(&dir, snapshot),
                    Err(e) => {
                        error!(path = %file_path, "error deleting file: {e}");
                        errors.push(generic_file_error("deleting", file_path));
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    errors.push(OpError::new(
                        ErrorKey::MissingFile,
                        format!("{file_path} doesn't exist."),
                    ));
                }
                Err(e) => {
                    error!(path = %file_path, "error inspecting file: {e}");
                    errors.push(generic_file_error("deleting", file_path));
                }
            }
        }

        for (kind, scope, files) in deleted.into_groups() {
            self.notifier
                .publish_files(kind, FilesChangedEvent::deleted(scope, files));
        }

        OpResult::from_errors(errors)
    }

    /// Moves save files into a destination directory.
    ///
    /// Publishes a Delete event per source category, then one Create event
    /// for the destination when it is a tracked save category. Untracked
    /// destinations (scenario storage) receive the files silently.
    pub async fn move_files(
        &self,
        server_id: &ServerId,
        destination: &str,
        file_paths: Vec<String>,
    ) -> OpResult {
        let target = match self.resolve_destination(server_id, destination).await {
            Ok(dir) => dir,
            Err(e) => return OpResult::failure(e),
        };
        let track_destination = target.kind.is_tracked();

        let mut removed = ChangeGroups::new();
        let mut created = Vec::new();
        let mut errors = Vec::new();

        for file_path in &file_paths {
            let (source_dir, source_path) = match self.resolve_file_path(server_id, file_path).await
            {
                Ok(resolved) => resolved,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            let old_snapshot = match metadata::file_snapshot(&source_path, &source_dir.tag).await {
                Ok(snapshot) => snapshot,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    errors.push(OpError::new(
                        ErrorKey::MissingFile,
                        format!("{file_path} doesn't exist."),
                    ));
                    continue;
                }
                Err(e) => {
                    error!(path = %file_path, "error inspecting file: {e}");
                    errors.push(generic_file_error("moving", file_path));
                    continue;
                }
            };

            let dest_path = target.path.join(&old_snapshot.name);
            if tokio::fs::try_exists(&dest_path).await.unwrap_or(false) {
                errors.push(OpError::new(
                    ErrorKey::FileAlreadyExists,
                    format!("{destination}/{} already exists.", old_snapshot.name),
                ));
                continue;
            }

            if let Err(e) = tokio::fs::rename(&source_path, &dest_path).await {
                error!(path = %file_path, "error moving file: {e}");
                errors.push(generic_file_error("moving", file_path));
                continue;
            }

            removed.push(&source_dir, old_snapshot);

            if track_destination {
                match metadata::file_snapshot(&dest_path, &target.tag).await {
                    Ok(snapshot) => created.push(snapshot),
                    Err(e) => {
                        error!(path = %file_path, "failed to capture moved metadata: {e}")
                    }
                }
            }
        }

        for (kind, scope, files) in removed.into_groups() {
            self.notifier
                .publish_files(kind, FilesChangedEvent::deleted(scope, files));
        }

        if track_destination && !created.is_empty() {
            self.notifier.publish_files(
                target.kind,
                FilesChangedEvent::created(target.server_id.clone(), created),
            );
        }

        OpResult::from_errors(errors)
    }

    /// Copies save files into a destination directory, preserving each
    /// source's modification time on the copy. Non-destructive on sources.
    pub async fn copy_files(
        &self,
        server_id: &ServerId,
        destination: &str,
        file_paths: Vec<String>,
    ) -> OpResult {
        let target = match self.resolve_destination(server_id, destination).await {
            Ok(dir) => dir,
            Err(e) => return OpResult::failure(e),
        };
        let track_destination = target.kind.is_tracked();

        let mut created = Vec::new();
        let mut errors = Vec::new();

        for file_path in &file_paths {
            let (_source_dir, source_path) = match self.resolve_file_path(server_id, file_path).await
            {
                Ok(resolved) => resolved,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            let source_meta = match tokio::fs::metadata(&source_path).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    errors.push(OpError::new(
                        ErrorKey::MissingFile,
                        format!("{file_path} doesn't exist."),
                    ));
                    continue;
                }
                Err(e) => {
                    error!(path = %file_path, "error inspecting file: {e}");
                    errors.push(generic_file_error("copying", file_path));
                    continue;
                }
            };

            let name = match source_path.file_name() {
                Some(name) => name.to_os_string(),
                None => {
                    errors.push(generic_file_error("copying", file_path));
                    continue;
                }
            };
            let dest_path = target.path.join(&name);
            if tokio::fs::try_exists(&dest_path).await.unwrap_or(false) {
                errors.push(OpError::new(
                    ErrorKey::FileAlreadyExists,
                    format!("{destination}/{} already exists.", name.to_string_lossy()),
                ));
                continue;
            }

            if let Err(e) = copy_preserving_mtime(&source_path, &dest_path, &source_meta).await {
                error!(path = %file_path, "error copying file: {e}");
                errors.push(generic_file_error("copying", file_path));
                continue;
            }

            if track_destination {
                match metadata::file_snapshot(&dest_path, &target.tag).await {
                    Ok(snapshot) => created.push(snapshot),
                    Err(e) => {
                        error!(path = %file_path, "failed to capture copied metadata: {e}")
                    }
                }
            }
        }

        if track_destination && !created.is_empty() {
            self.notifier.publish_files(
                target.kind,
                FilesChangedEvent::created(target.server_id.clone(), created),
            );
        }

        OpResult::from_errors(errors)
    }

    /// Renames one save file in place, enforcing the save extension on the
    /// new name. Publishes a single Rename event pairing old and new
    /// metadata.
    pub async fn rename_file(
        &self,
        server_id: &ServerId,
        directory: &str,
        file_name: &str,
        new_file_name: &str,
    ) -> OpResult {
        if let Err(e) = validate_file_name(new_file_name) {
            return OpResult::failure(e);
        }

        let dir = match self.resolve_save_directory(server_id, directory).await {
            Ok(dir) => dir,
            Err(e) => return OpResult::failure(e),
        };

        // Rename takes bare names only; anything path-like is refused.
        for name in [file_name, new_file_name] {
            if !is_plain_file_name(name) {
                return OpResult::failure(OpError::new(
                    ErrorKey::InvalidFileName,
                    format!("Invalid file name {name}."),
                ));
            }
        }

        let source_path = dir.path.join(file_name);
        let old_snapshot = match metadata::file_snapshot(&source_path, &dir.tag).await {
            Ok(snapshot) => snapshot,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return OpResult::failure(OpError::new(
                    ErrorKey::MissingFile,
                    format!("File {file_name} doesn't exist."),
                ));
            }
            Err(e) => {
                error!(name = %file_name, "error inspecting file: {e}");
                return OpResult::failure(generic_file_error("renaming", file_name));
            }
        };

        let mut new_name = new_file_name.to_string();
        if !has_extension(&new_name, SAVE_EXTENSION) {
            new_name.push('.');
            new_name.push_str(SAVE_EXTENSION);
        }
        let dest_path = dir.path.join(&new_name);

        if tokio::fs::try_exists(&dest_path).await.unwrap_or(false) {
            return OpResult::failure(OpError::new(
                ErrorKey::FileAlreadyExists,
                format!("File {new_name} already exists."),
            ));
        }

        if let Err(e) = tokio::fs::rename(&source_path, &dest_path).await {
            error!(name = %file_name, "error renaming file: {e}");
            return OpResult::failure(generic_file_error("renaming", file_name));
        }

        let new_snapshot = match metadata::file_snapshot(&dest_path, &dir.tag).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(name = %new_name, "failed to capture renamed metadata: {e}");
                return OpResult::failure(generic_file_error("renaming", file_name));
            }
        };

        let scope = event_scope(&dir);
        self.notifier.publish_files(
            dir.kind,
            FilesChangedEvent::renamed(scope, vec![new_snapshot], vec![old_snapshot]),
        );

        OpResult::ok()
    }

    // ========================================================================
    // Re-notification helpers
    // ========================================================================

    /// Re-lists a server's temp saves and publishes them as a Create event.
    /// Used after the server process writes autosaves outside our control.
    pub async fn notify_temp_saves_changed(&self, server_id: &ServerId) {
        let files = self.get_temp_save_files(server_id).await;
        self.notifier.publish_files(
            DirectoryKind::TempSaves,
            FilesChangedEvent::created(server_id.clone(), files),
        );
    }

    /// Lists temp saves modified at or after `since`. The orchestrator uses
    /// this for its periodic sweep, keeping the last-checked timestamp under
    /// the server lock.
    pub async fn temp_saves_modified_since(
        &self,
        server_id: &ServerId,
        since: DateTime<Utc>,
    ) -> Vec<FileMetaData> {
        self.get_temp_save_files(server_id)
            .await
            .into_iter()
            .filter(|f| f.last_modified_time >= since)
            .collect()
    }

    /// Publishes a Create event carrying a fresh temp-save listing filtered
    /// to files modified since the given instant.
    pub async fn publish_recent_temp_saves(&self, server_id: &ServerId, since: DateTime<Utc>) {
        let files = self.temp_saves_modified_since(server_id, since).await;
        self.notifier.publish_files(
            DirectoryKind::TempSaves,
            FilesChangedEvent::created(server_id.clone(), files),
        );
    }

    /// Re-lists the scenario catalogue and publishes it. Invoked by the
    /// out-of-band refresh trigger after a code update.
    pub async fn notify_scenarios_changed(&self) {
        let scenarios = self.get_scenarios().await;
        self.notifier.publish_scenarios(ScenariosChangedEvent {
            kind: ChangeKind::Create,
            scenarios,
        });
    }

    // ========================================================================
    // Internal resolution
    // ========================================================================

    /// Resolves a directory string and requires it to be one of the three
    /// save categories.
    async fn resolve_save_directory(
        &self,
        server_id: &ServerId,
        directory: &str,
    ) -> Result<ResolvedDirectory, OpError> {
        let dir = self
            .sandbox
            .resolve_directory(server_id, directory)
            .await
            .map_err(|e| surface_sandbox_error(e, directory))?;

        if !dir.kind.is_tracked() {
            warn!(directory, "refused non-save directory for save operation");
            return Err(OpError::new(ErrorKey::InvalidDirectory, directory));
        }

        Ok(dir)
    }

    /// Resolves a move/copy destination. Valid destinations are the three
    /// save categories and scenario storage; log directories are not
    /// writable through file operations.
    async fn resolve_destination(
        &self,
        server_id: &ServerId,
        destination: &str,
    ) -> Result<ResolvedDirectory, OpError> {
        let dir = self
            .sandbox
            .resolve_directory(server_id, destination)
            .await
            .map_err(|e| surface_sandbox_error(e, destination))?;

        if !dir.kind.is_tracked() && dir.kind != DirectoryKind::Scenarios {
            warn!(destination, "refused log directory as destination");
            return Err(OpError::new(ErrorKey::InvalidDirectory, destination));
        }

        Ok(dir)
    }

    /// Splits a `"{directory}/{fileName}"` path, resolves its save
    /// directory, and sandbox-joins the file name.
    async fn resolve_file_path(
        &self,
        server_id: &ServerId,
        file_path: &str,
    ) -> Result<(ResolvedDirectory, PathBuf), OpError> {
        let (directory, file_name) = file_path
            .rsplit_once('/')
            .ok_or_else(|| OpError::new(ErrorKey::InvalidDirectory, file_path))?;

        let dir = self.resolve_save_directory(server_id, directory).await?;
        let path = self
            .sandbox
            .safe_file_path(&dir.path, file_name)
            .map_err(|e| surface_sandbox_error(e, file_path))?;

        Ok((dir, path))
    }
}

/// Event scope for a directory: the owning server, or global for the
/// process-wide save directory.
fn event_scope(dir: &ResolvedDirectory) -> ServerId {
    dir.server_id.clone()
}

/// Accumulates change snapshots grouped by (category, scope), preserving
/// first-seen order so event ordering stays deterministic.
struct ChangeGroups {
    groups: Vec<(DirectoryKind, ServerId, Vec<FileMetaData>)>,
}

impl ChangeGroups {
    fn new() -> Self {
        Self { groups: Vec::new() }
    }

    fn push(&mut self, dir: &ResolvedDirectory, snapshot: FileMetaData) {
        let scope = event_scope(dir);
        if let Some((_, _, files)) = self
            .groups
            .iter_mut()
            .find(|(kind, s, _)| *kind == dir.kind && *s == scope)
        {
            files.push(snapshot);
        } else {
            self.groups.push((dir.kind, scope, vec![snapshot]));
        }
    }

    fn into_groups(self) -> Vec<(DirectoryKind, ServerId, Vec<FileMetaData>)> {
        self.groups
    }
}

enum WriteError {
    AlreadyExists,
    Io(io::Error),
}

/// Writes an upload stream to disk, failing instead of clobbering, and
/// fsyncs before returning so the following metadata snapshot sees final
/// state.
async fn write_upload(
    path: &Path,
    content: &mut (dyn AsyncRead + Send + Unpin),
) -> Result<(), WriteError> {
    let mut file = match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(WriteError::AlreadyExists)
        }
        Err(e) => return Err(WriteError::Io(e)),
    };

    tokio::io::copy(content, &mut file)
        .await
        .map_err(WriteError::Io)?;
    file.sync_all().await.map_err(WriteError::Io)?;
    Ok(())
}

/// Copies a file and stamps the copy with the source's modification time,
/// so the destination reads as a content clone rather than a new file.
async fn copy_preserving_mtime(
    source: &Path,
    dest: &Path,
    source_meta: &std::fs::Metadata,
) -> io::Result<()> {
    tokio::fs::copy(source, dest).await?;
    let modified = source_meta.modified()?;
    let file = std::fs::OpenOptions::new().write(true).open(dest)?;
    file.set_modified(modified)
}

fn validate_file_name(name: &str) -> Result<(), OpError> {
    if name.trim().is_empty() {
        return Err(OpError::new(ErrorKey::InvalidFileName, name));
    }
    if name.contains(' ') {
        return Err(OpError::new(
            ErrorKey::InvalidFileName,
            format!("name {name} cannot contain spaces."),
        ));
    }
    Ok(())
}

fn has_extension(name: &str, extension: &str) -> bool {
    Path::new(name).extension().and_then(OsStr::to_str) == Some(extension)
}

fn is_plain_file_name(name: &str) -> bool {
    Path::new(name).file_name() == Some(OsStr::new(name))
}

/// Collapses internal sandbox failures into the caller-visible taxonomy.
/// Unknown category and escape are deliberately indistinguishable.
fn surface_sandbox_error(err: SandboxError, shown: &str) -> OpError {
    match err {
        SandboxError::UnknownDirectory(_) | SandboxError::Escape(_) => {
            debug!("sandbox refused {shown}: {err}");
            OpError::new(ErrorKey::InvalidDirectory, shown)
        }
        SandboxError::BadFileName(_) => OpError::new(ErrorKey::InvalidFileName, shown),
        SandboxError::CreateDir { .. } => {
            error!("sandbox i/o failure for {shown}: {err}");
            generic_file_error("accessing", shown)
        }
    }
}

fn generic_file_error(action: &str, subject: &str) -> OpError {
    OpError::new(ErrorKey::FileError, format!("Error {action} {subject}."))
}
