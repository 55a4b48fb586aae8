//! Version discovery and the local download cache
//!
//! Downloadable versions come from an external source behind a trait so the
//! rest of the crate never touches the network directly. Downloaded
//! archives are cached on disk and can be listed or evicted by version
//! string.

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// File name suffix for cached server archives, e.g. `1.1.110.tar.xz`.
pub const CACHED_ARCHIVE_SUFFIX: &str = ".tar.xz";

/// Where downloadable version strings come from.
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Lists versions available for download, newest first.
    async fn downloadable_versions(&self) -> io::Result<Vec<String>>;
}

/// Version queries backed by an external source plus the on-disk archive
/// cache.
pub struct VersionCache {
    cache_dir: PathBuf,
    source: Arc<dyn VersionSource>,
}

impl VersionCache {
    pub fn new(cache_dir: impl Into<PathBuf>, source: Arc<dyn VersionSource>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            source,
        }
    }

    pub async fn get_downloadable_versions(&self) -> io::Result<Vec<String>> {
        self.source.downloadable_versions().await
    }

    /// Lists versions with an archive already present in the cache.
    /// Non-archive files in the cache directory are ignored.
    pub async fn get_cached_versions(&self) -> Vec<String> {
        let mut entries = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.cache_dir.display(), "failed to read version cache: {e}");
                return Vec::new();
            }
        };

        let mut versions = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(version) = name.strip_suffix(CACHED_ARCHIVE_SUFFIX) {
                if !version.is_empty() {
                    versions.push(version.to_string());
                }
            }
        }
        versions.sort();
        versions
    }

    /// Deletes one cached archive. Returns `false` when no such archive
    /// exists; a concurrent eviction of the same version is not an error.
    pub async fn delete_cached_version(&self, version: &str) -> bool {
        let path = self
            .cache_dir
            .join(format!("{version}{CACHED_ARCHIVE_SUFFIX}"));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), "failed to delete cached version: {e}");
                false
            }
        }
    }
}

impl std::fmt::Debug for VersionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionCache")
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    struct FixedSource(Vec<String>);

    #[async_trait]
    impl VersionSource for FixedSource {
        async fn downloadable_versions(&self) -> io::Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    fn cache(dir: &Path) -> VersionCache {
        VersionCache::new(
            dir,
            Arc::new(FixedSource(vec!["1.1.110".to_string(), "1.1.109".to_string()])),
        )
    }

    #[tokio::test]
    async fn cached_versions_come_from_archive_names_only() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("1.1.110.tar.xz"), b"x").unwrap();
        std::fs::write(dir.path().join("1.1.109.tar.xz"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let cache = cache(dir.path());
        assert_eq!(cache.get_cached_versions().await, vec!["1.1.109", "1.1.110"]);
    }

    #[tokio::test]
    async fn missing_cache_directory_lists_nothing() {
        let dir = tempdir().unwrap();
        let cache = cache(&dir.path().join("absent"));
        assert!(cache.get_cached_versions().await.is_empty());
    }

    #[tokio::test]
    async fn delete_reports_whether_an_archive_was_removed() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("1.1.110.tar.xz"), b"x").unwrap();

        let cache = cache(dir.path());
        assert!(cache.delete_cached_version("1.1.110").await);
        // Second delete of the same version is a benign no-op.
        assert!(!cache.delete_cached_version("1.1.110").await);
        assert!(!dir.path().join("1.1.110.tar.xz").exists());
    }

    #[tokio::test]
    async fn downloadable_versions_pass_through_the_source() {
        let dir = tempdir().unwrap();
        let cache = cache(dir.path());
        assert_eq!(
            cache.get_downloadable_versions().await.unwrap(),
            vec!["1.1.110", "1.1.109"]
        );
    }
}
