//! Projection of filesystem entries into metadata snapshots
//!
//! Pure read-side helpers: a filesystem entry goes in, an immutable
//! [`FileMetaData`] or [`ScenarioMetaData`] record comes out. I/O faults are
//! propagated to the caller; the engine decides where a logged-and-empty
//! fallback applies.

use chrono::{DateTime, Utc};
use garrison_types::{FileMetaData, ScenarioMetaData};
use std::io;
use std::path::Path;
use std::time::SystemTime;

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    time.into()
}

/// Creation time where the platform records one, falling back to the
/// modification time on filesystems that do not.
fn created_or_modified(meta: &std::fs::Metadata) -> io::Result<SystemTime> {
    meta.created().or_else(|_| meta.modified())
}

/// Snapshot of a single file, tagged with its logical directory.
pub async fn file_snapshot(path: &Path, directory_tag: &str) -> io::Result<FileMetaData> {
    let meta = tokio::fs::metadata(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(FileMetaData {
        name,
        directory: directory_tag.to_string(),
        created_time: to_utc(created_or_modified(&meta)?),
        last_modified_time: to_utc(meta.modified()?),
        size: meta.len(),
    })
}

/// Snapshot of a directory-backed scenario package.
pub async fn scenario_snapshot(path: &Path) -> io::Result<ScenarioMetaData> {
    let meta = tokio::fs::metadata(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(ScenarioMetaData {
        name,
        created_time: to_utc(created_or_modified(&meta)?),
        last_modified_time: to_utc(meta.modified()?),
    })
}

/// Lists regular files with the given extension in one directory,
/// projecting each into a snapshot. Entries that vanish mid-listing are
/// skipped rather than failing the whole listing.
pub async fn list_files_with_extension(
    dir: &Path,
    directory_tag: &str,
    extension: &str,
) -> io::Result<Vec<FileMetaData>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }
        if let Ok(snapshot) = file_snapshot(&path, directory_tag).await {
            files.push(snapshot);
        }
    }

    Ok(files)
}

/// Lists scenario packages (immediate subdirectories) beneath the scenario
/// root.
pub async fn list_scenarios(dir: &Path) -> io::Result<Vec<ScenarioMetaData>> {
    let mut scenarios = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let Ok(file_type) = entry.file_type().await else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }
        if let Ok(snapshot) = scenario_snapshot(&entry.path()).await {
            scenarios.push(snapshot);
        }
    }

    Ok(scenarios)
}
