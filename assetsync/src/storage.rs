//! Guarded filesystem access under the storage root.
//!
//! Every cached manifest and downloaded asset lives under one caller-provided
//! directory. All create/remove operations here refuse to touch anything
//! outside that directory.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Cached copy of the authoritative local manifest.
pub const MANIFEST_FILENAME: &str = "project.manifest";

/// Remote manifest while its batch is in progress.
pub const STAGED_MANIFEST_FILENAME: &str = "project.manifest.download";

/// Downloaded remote version probe.
pub const VERSION_FILENAME: &str = "version.manifest";

/// Errors from storage-root operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The path is not inside the storage root.
    #[error("path {} is outside the storage root {}", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// A relative asset path tried to escape the root or was absolute.
    #[error("invalid relative path: {0}")]
    InvalidRelativePath(String),

    /// An underlying filesystem call failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// The writable directory all update state lives under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRoot {
    root: PathBuf,
}

impl StorageRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn cached_manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILENAME)
    }

    pub fn staged_manifest_path(&self) -> PathBuf {
        self.root.join(STAGED_MANIFEST_FILENAME)
    }

    pub fn version_file_path(&self) -> PathBuf {
        self.root.join(VERSION_FILENAME)
    }

    /// Resolve a manifest-relative path (e.g. an asset path) under the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(relative);
        let escapes = rel.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if relative.is_empty() || escapes {
            return Err(StorageError::InvalidRelativePath(relative.to_string()));
        }
        Ok(self.root.join(rel))
    }

    /// Whether `path` lies strictly inside the root.
    ///
    /// The check is lexical: `..` components anywhere below the root are
    /// rejected rather than resolved.
    pub fn contains(&self, path: &Path) -> bool {
        match path.strip_prefix(&self.root) {
            Ok(rest) => {
                rest.components().next().is_some()
                    && rest.components().all(|c| matches!(c, Component::Normal(_)))
            }
            Err(_) => false,
        }
    }

    fn guard(&self, path: &Path) -> Result<(), StorageError> {
        if self.contains(path) {
            Ok(())
        } else {
            Err(StorageError::OutsideRoot {
                path: path.to_path_buf(),
                root: self.root.clone(),
            })
        }
    }

    /// Create the root directory if it does not exist.
    pub fn ensure_exists(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(|e| StorageError::Io {
            path: self.root.clone(),
            source: e,
        })
    }

    /// Create every missing directory above `path`.
    pub fn create_parent_dirs(&self, path: &Path) -> Result<(), StorageError> {
        self.guard(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Remove a file under the root.
    ///
    /// Returns `Ok(false)` if there was nothing to remove.
    pub fn remove_file(&self, path: &Path) -> Result<bool, StorageError> {
        self.guard(path)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Recursively remove a directory under the root.
    pub fn remove_dir_all(&self, path: &Path) -> Result<bool, StorageError> {
        self.guard(path)?;
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Atomically move `from` onto `to`, both under the root.
    pub fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        self.guard(from)?;
        self.guard(to)?;
        fs::rename(from, to).map_err(|e| StorageError::Io {
            path: from.to_path_buf(),
            source: e,
        })
    }

    /// Remove everything inside the root, keeping the root itself.
    ///
    /// Returns the number of top-level entries removed.
    pub fn clear(&self) -> Result<usize, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(StorageError::Io {
                    path: self.root.clone(),
                    source: e,
                })
            }
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::Io {
                path: self.root.clone(),
                source: e,
            })?;
            let path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let gone = if is_dir {
                self.remove_dir_all(&path)?
            } else {
                self.remove_file(&path)?
            };
            if gone {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_well_known_paths() {
        let storage = StorageRoot::new("/data/game");
        assert_eq!(
            storage.cached_manifest_path(),
            PathBuf::from("/data/game/project.manifest")
        );
        assert_eq!(
            storage.version_file_path(),
            PathBuf::from("/data/game/version.manifest")
        );
        assert_eq!(
            storage.staged_manifest_path(),
            PathBuf::from("/data/game/project.manifest.download")
        );
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let storage = StorageRoot::new("/data/game");

        assert_eq!(
            storage.resolve("res/a.png").unwrap(),
            PathBuf::from("/data/game/res/a.png")
        );
        assert!(storage.resolve("../etc/passwd").is_err());
        assert!(storage.resolve("res/../../x").is_err());
        assert!(storage.resolve("/etc/passwd").is_err());
        assert!(storage.resolve("").is_err());
    }

    #[test]
    fn test_contains() {
        let storage = StorageRoot::new("/data/game");

        assert!(storage.contains(Path::new("/data/game/a")));
        assert!(storage.contains(Path::new("/data/game/res/a.png")));
        assert!(!storage.contains(Path::new("/data/game")));
        assert!(!storage.contains(Path::new("/data/other/a")));
        assert!(!storage.contains(Path::new("/data/game/../other")));
    }

    #[test]
    fn test_remove_refuses_outside_root() {
        let temp = TempDir::new().unwrap();
        let outside = temp.path().join("keep.txt");
        fs::write(&outside, b"x").unwrap();

        let storage = StorageRoot::new(temp.path().join("root"));
        let result = storage.remove_file(&outside);

        assert!(matches!(result, Err(StorageError::OutsideRoot { .. })));
        assert!(outside.exists());
    }

    #[test]
    fn test_remove_missing_file_is_ok() {
        let temp = TempDir::new().unwrap();
        let storage = StorageRoot::new(temp.path());
        assert!(!storage.remove_file(&temp.path().join("nope")).unwrap());
    }

    #[test]
    fn test_create_parents_and_clear() {
        let temp = TempDir::new().unwrap();
        let storage = StorageRoot::new(temp.path().join("root"));
        storage.ensure_exists().unwrap();

        let nested = storage.resolve("res/sub/a.bin").unwrap();
        storage.create_parent_dirs(&nested).unwrap();
        fs::write(&nested, b"data").unwrap();
        fs::write(storage.cached_manifest_path(), b"{}").unwrap();

        assert_eq!(storage.clear().unwrap(), 2);
        assert!(storage.path().exists());
        assert!(!nested.exists());
    }

    #[test]
    fn test_rename_within_root() {
        let temp = TempDir::new().unwrap();
        let storage = StorageRoot::new(temp.path());
        fs::write(storage.staged_manifest_path(), b"new").unwrap();

        storage
            .rename(
                &storage.staged_manifest_path(),
                &storage.cached_manifest_path(),
            )
            .unwrap();

        assert_eq!(fs::read(storage.cached_manifest_path()).unwrap(), b"new");
        assert!(!storage.staged_manifest_path().exists());
    }
}
