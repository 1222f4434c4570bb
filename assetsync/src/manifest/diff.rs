//! Asset-level delta between two manifests.

use std::collections::BTreeMap;

use super::{AssetDiff, DiffType, Manifest};

impl Manifest {
    /// Compute the changes needed to go from `self` (local) to `remote`.
    ///
    /// Keys only in `remote` are [`DiffType::Added`], keys only in `self` are
    /// [`DiffType::Deleted`], and shared keys whose checksums differ
    /// byte-for-byte are [`DiffType::Modified`]. Shared keys with equal
    /// checksums are omitted. Neither manifest is modified.
    pub fn gen_diff(&self, remote: &Manifest) -> BTreeMap<String, AssetDiff> {
        let mut diff = BTreeMap::new();

        for (key, local_asset) in self.assets() {
            match remote.asset(key) {
                None => {
                    diff.insert(
                        key.clone(),
                        AssetDiff {
                            asset: local_asset.clone(),
                            diff_type: DiffType::Deleted,
                        },
                    );
                }
                Some(remote_asset) if remote_asset.checksum != local_asset.checksum => {
                    diff.insert(
                        key.clone(),
                        AssetDiff {
                            asset: remote_asset.clone(),
                            diff_type: DiffType::Modified,
                        },
                    );
                }
                Some(_) => {}
            }
        }

        for (key, remote_asset) in remote.assets() {
            if self.asset(key).is_none() {
                diff.insert(
                    key.clone(),
                    AssetDiff {
                        asset: remote_asset.clone(),
                        diff_type: DiffType::Added,
                    },
                );
            }
        }

        diff
    }
}
