//! Path resolution against a single sandbox root
//!
//! Every file operation goes through here before any I/O happens. A caller
//! supplies a logical directory string and a file name; the sandbox maps
//! them to an absolute path beneath the configured root or refuses. The two
//! refusal causes (unknown category, escape attempt) stay distinct
//! internally for logging but are surfaced identically to callers.

use garrison_types::{DirectoryKind, ServerId};
use std::collections::HashSet;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Name of the live log file at a server's directory root.
pub const CURRENT_LOG_FILE: &str = "current.log";

/// Internal sandbox failure. Callers translate every variant into the same
/// caller-visible `InvalidDirectory` error so probing cannot distinguish a
/// bad category from an escape attempt.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("unknown directory: {0}")]
    UnknownDirectory(String),

    #[error("path escapes sandbox root: {0}")]
    Escape(String),

    #[error("invalid file name: {0}")]
    BadFileName(String),

    #[error("failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
}

/// A logical directory resolved to a location on disk.
#[derive(Debug, Clone)]
pub struct ResolvedDirectory {
    pub kind: DirectoryKind,
    /// Owning server for server-scoped categories, global otherwise.
    pub server_id: ServerId,
    /// Absolute directory path, guaranteed beneath the sandbox root.
    pub path: PathBuf,
    /// Logical tag recorded in metadata, e.g. `"1/local_saves"`.
    pub tag: String,
}

/// Maps logical directories and file names onto a single filesystem root.
///
/// The set of resolvable directories is closed over the server ids supplied
/// at construction; nothing outside it is probed on disk.
#[derive(Debug)]
pub struct PathSandbox {
    root: PathBuf,
    server_ids: HashSet<ServerId>,
}

impl PathSandbox {
    /// Creates a sandbox over `root`, which is created if missing. The root
    /// is canonicalized so prefix checks are not fooled by symlinked or
    /// relative roots.
    ///
    /// Server ids double as directory names beneath the root, so an id must
    /// be a single normal path component; ids like `".."` or `"."` would
    /// resolve outside the root and are refused here, before any path is
    /// ever built from them.
    pub fn new(root: impl Into<PathBuf>, server_ids: Vec<ServerId>) -> io::Result<Self> {
        for id in &server_ids {
            let mut components = Path::new(id.as_str()).components();
            let single_normal = matches!(components.next(), Some(Component::Normal(_)))
                && components.next().is_none();
            if !single_normal {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid server id {:?}", id.as_str()),
                ));
            }
        }

        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self {
            root,
            server_ids: server_ids.into_iter().collect(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_valid_server_id(&self, id: &ServerId) -> bool {
        self.server_ids.contains(id)
    }

    pub fn server_ids(&self) -> impl Iterator<Item = &ServerId> {
        self.server_ids.iter()
    }

    /// Absolute path of a server's directory beneath the root.
    pub fn server_root(&self, id: &ServerId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Absolute path of a server's live log file.
    pub fn current_log_path(&self, id: &ServerId) -> PathBuf {
        self.server_root(id).join(CURRENT_LOG_FILE)
    }

    /// Parses a logical directory string into its category and owning
    /// server, without touching the filesystem.
    ///
    /// Accepted forms: a bare process-wide name (`global_saves`,
    /// `scenarios`), a bare server-scoped name resolved against
    /// `requesting_server`, or a `<serverId>/<name>` pair naming a
    /// registered server.
    pub fn parse_directory(
        &self,
        requesting_server: &ServerId,
        directory: &str,
    ) -> Result<(DirectoryKind, ServerId), SandboxError> {
        let unknown = || SandboxError::UnknownDirectory(directory.to_string());

        match directory.split_once('/') {
            None => {
                let kind = DirectoryKind::from_dir_name(directory).ok_or_else(unknown)?;
                if kind.is_server_scoped() {
                    if !self.is_valid_server_id(requesting_server) {
                        return Err(unknown());
                    }
                    Ok((kind, requesting_server.clone()))
                } else {
                    Ok((kind, ServerId::global()))
                }
            }
            Some((server, name)) => {
                let kind = DirectoryKind::from_dir_name(name).ok_or_else(unknown)?;
                let server = ServerId::new(server);
                if !kind.is_server_scoped() || !self.is_valid_server_id(&server) {
                    return Err(unknown());
                }
                Ok((kind, server))
            }
        }
    }

    /// Resolves a logical directory to a location on disk, creating the
    /// directory if it does not exist yet. First use of a server's save
    /// directory must not fail, so creation is idempotent.
    pub async fn resolve_directory(
        &self,
        requesting_server: &ServerId,
        directory: &str,
    ) -> Result<ResolvedDirectory, SandboxError> {
        let (kind, server_id) = self.parse_directory(requesting_server, directory)?;

        let (path, tag) = if kind.is_server_scoped() {
            (
                self.root.join(server_id.as_str()).join(kind.dir_name()),
                format!("{}/{}", server_id, kind.dir_name()),
            )
        } else {
            (self.root.join(kind.dir_name()), kind.dir_name().to_string())
        };

        // Paths are built from validated components only, but the prefix
        // check stays as a final guard.
        if !path.starts_with(&self.root) {
            warn!(directory, "resolved directory escapes sandbox root");
            return Err(SandboxError::Escape(directory.to_string()));
        }

        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| SandboxError::CreateDir {
                path: path.clone(),
                source,
            })?;

        Ok(ResolvedDirectory {
            kind,
            server_id,
            path,
            tag,
        })
    }

    /// Joins a user-supplied file name onto a resolved directory.
    ///
    /// Names carrying traversal segments or an absolute-path prefix are
    /// rejected outright; a plain relative name is reduced to its final
    /// path component before joining. No filesystem access happens here.
    pub fn safe_file_path(&self, dir: &Path, file_name: &str) -> Result<PathBuf, SandboxError> {
        let supplied = Path::new(file_name);
        if supplied
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            warn!(file_name, "rejected traversal attempt in file name");
            return Err(SandboxError::Escape(file_name.to_string()));
        }

        let name = supplied
            .file_name()
            .ok_or_else(|| SandboxError::BadFileName(file_name.to_string()))?;

        let path = dir.join(name);
        if !path.starts_with(&self.root) {
            warn!(file_name, "joined path escapes sandbox root");
            return Err(SandboxError::Escape(file_name.to_string()));
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sandbox(root: &Path) -> PathSandbox {
        PathSandbox::new(root, vec![ServerId::new("1"), ServerId::new("2")]).unwrap()
    }

    #[test]
    fn unknown_category_is_rejected_without_probing() {
        let dir = tempdir().unwrap();
        let sb = sandbox(dir.path());

        let err = sb.parse_directory(&ServerId::new("1"), "mods").unwrap_err();
        assert!(matches!(err, SandboxError::UnknownDirectory(_)));
        assert!(!dir.path().join("mods").exists());
    }

    #[test]
    fn bare_server_scoped_name_uses_requesting_server() {
        let dir = tempdir().unwrap();
        let sb = sandbox(dir.path());

        let (kind, server) = sb
            .parse_directory(&ServerId::new("2"), "local_saves")
            .unwrap();
        assert_eq!(kind, DirectoryKind::LocalSaves);
        assert_eq!(server, ServerId::new("2"));
    }

    #[test]
    fn qualified_name_must_reference_registered_server() {
        let dir = tempdir().unwrap();
        let sb = sandbox(dir.path());

        assert!(sb
            .parse_directory(&ServerId::new("1"), "2/temp_saves")
            .is_ok());
        assert!(sb
            .parse_directory(&ServerId::new("1"), "9/temp_saves")
            .is_err());
        // Process-wide categories cannot be server-qualified.
        assert!(sb
            .parse_directory(&ServerId::new("1"), "1/global_saves")
            .is_err());
    }

    #[tokio::test]
    async fn resolve_creates_directory_idempotently() {
        let dir = tempdir().unwrap();
        let sb = sandbox(dir.path());
        let id = ServerId::new("1");

        let first = sb.resolve_directory(&id, "local_saves").await.unwrap();
        assert!(first.path.exists());
        let second = sb.resolve_directory(&id, "local_saves").await.unwrap();
        assert_eq!(first.path, second.path);
        assert_eq!(first.tag, "1/local_saves");
    }

    #[test]
    fn traversal_names_are_rejected() {
        let dir = tempdir().unwrap();
        let sb = sandbox(dir.path());
        let saves = dir.path().join("global_saves");

        for name in [
            "../escape.zip",
            "../../etc/passwd",
            "..",
            "",
            "a/..",
            "/abs/path/save.zip",
        ] {
            assert!(
                sb.safe_file_path(&saves, name).is_err(),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn dot_server_ids_are_refused_at_construction() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");

        for id in ["..", ".", "", "a/b", "/abs"] {
            let err = PathSandbox::new(&root, vec![ServerId::new(id)]).unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput, "{id:?}");
        }

        // No directory was created beside the root.
        assert!(!dir.path().join("local_saves").exists());
    }

    #[test]
    fn embedded_directories_are_stripped_to_basename() {
        let dir = tempdir().unwrap();
        let sb = sandbox(dir.path());
        let saves = dir.path().join("global_saves");

        let path = sb.safe_file_path(&saves, "nested/dir/save.zip").unwrap();
        assert_eq!(path, saves.join("save.zip"));
    }
}
