//! Asset records and the diff entries built from them.

use serde::Serialize;

/// One checksummed file tracked by a manifest.
///
/// Assets are keyed by a string that is unique within their manifest; the key
/// is not stored on the asset itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    /// Path relative to the storage root (and to the package URL).
    pub path: String,

    /// Checksum string as published in the manifest (`md5` key).
    ///
    /// Compared byte-for-byte; an absent checksum is the empty string.
    #[serde(rename = "md5")]
    pub checksum: String,

    /// Group the asset belongs to, empty when ungrouped.
    pub group: String,

    /// Set while the asset is part of an in-flight batch.
    #[serde(skip)]
    updating: bool,
}

impl Asset {
    /// Create an asset that is not part of any batch.
    pub fn new(
        path: impl Into<String>,
        checksum: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            checksum: checksum.into(),
            group: group.into(),
            updating: false,
        }
    }

    /// Whether the asset is currently being downloaded.
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    pub(crate) fn set_updating(&mut self, updating: bool) {
        self.updating = updating;
    }
}

/// Kind of change between two manifests for one asset key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffType {
    /// Present only in the remote manifest.
    Added,
    /// Present only in the local manifest.
    Deleted,
    /// Present in both with differing checksums.
    Modified,
}

impl DiffType {
    /// Whether realising this change needs a download.
    pub fn needs_download(&self) -> bool {
        !matches!(self, Self::Deleted)
    }
}

impl std::fmt::Display for DiffType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Modified => "modified",
        };
        f.write_str(name)
    }
}

/// A single asset-level change.
///
/// For [`DiffType::Deleted`] the asset is the local one; otherwise it is the
/// remote one, which is what must be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDiff {
    pub asset: Asset,
    pub diff_type: DiffType,
}
