//! Versioned asset manifests.
//!
//! A [`Manifest`] describes one version of an asset set: its version id,
//! where to fetch newer version/manifest files, and the table of assets.
//! Manifests have two lifecycle stages:
//!
//! - **version-loaded**: only the cheap metadata from a small version file
//! - **fully-loaded**: metadata plus the complete asset table
//!
//! Parsing is tolerant: optional fields with the wrong type are treated as
//! absent, and asset entries without a string `path` are left out of the
//! table.
//!
//! # Document format
//!
//! ```text
//! {
//!   "version": "1.0.3",
//!   "engineVersion": "3.0",
//!   "packageUrl": "https://cdn.example.com/game/",
//!   "remoteManifestUrl": "https://cdn.example.com/game/project.manifest",
//!   "remoteVersionUrl": "https://cdn.example.com/game/version.manifest",
//!   "groupVersions": { "1": "1.0.1", "2": "1.0.3" },
//!   "searchPaths": ["res"],
//!   "assets": {
//!     "logo": { "path": "res/logo.png", "md5": "9e1c...", "group": "1" }
//!   }
//! }
//! ```

mod asset;
mod diff;
mod error;

pub use asset::{Asset, AssetDiff, DiffType};
pub use error::{ManifestError, ManifestResult};

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

const KEY_VERSION: &str = "version";
const KEY_PACKAGE_URL: &str = "packageUrl";
const KEY_MANIFEST_URL: &str = "remoteManifestUrl";
const KEY_VERSION_URL: &str = "remoteVersionUrl";
const KEY_GROUP_VERSIONS: &str = "groupVersions";
const KEY_ENGINE_VERSION: &str = "engineVersion";
const KEY_SEARCH_PATHS: &str = "searchPaths";
const KEY_ASSETS: &str = "assets";

const KEY_PATH: &str = "path";
const KEY_MD5: &str = "md5";
const KEY_GROUP: &str = "group";

/// Group version used when a group maps to a non-string value.
const DEFAULT_GROUP_VERSION: &str = "0";

/// Description of a versioned set of assets and where to fetch them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    version_id: String,
    engine_version: String,
    version_file_url: String,
    manifest_file_url: String,
    package_url: String,
    groups: Vec<String>,
    group_versions: HashMap<String, String>,
    search_paths: Vec<String>,
    assets: BTreeMap<String, Asset>,
    loaded: bool,
    version_loaded: bool,
}

impl Manifest {
    /// Create an empty, unloaded manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a full manifest from a file.
    pub fn from_file(path: impl AsRef<Path>) -> ManifestResult<Self> {
        let mut manifest = Self::new();
        manifest.parse_file(path)?;
        Ok(manifest)
    }

    /// Load only the version metadata from a file.
    pub fn version_from_file(path: impl AsRef<Path>) -> ManifestResult<Self> {
        let mut manifest = Self::new();
        manifest.parse_version_file(path)?;
        Ok(manifest)
    }

    /// Parse a full manifest from JSON text.
    pub fn from_json_str(text: &str) -> ManifestResult<Self> {
        let mut manifest = Self::new();
        manifest.load_full(parse_document(text)?);
        Ok(manifest)
    }

    /// Parse only the version metadata from JSON text.
    pub fn version_from_json_str(text: &str) -> ManifestResult<Self> {
        let mut manifest = Self::new();
        manifest.load_version(&parse_document(text)?);
        Ok(manifest)
    }

    /// Clear this manifest and rebuild it from a full manifest file.
    ///
    /// On failure the manifest is left cleared and unloaded.
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> ManifestResult<()> {
        self.clear();
        let document = read_document(path.as_ref())?;
        self.load_full(document);
        Ok(())
    }

    /// Clear this manifest and rebuild its version metadata from a file.
    ///
    /// The asset table stays empty and the manifest is not fully loaded.
    pub fn parse_version_file(&mut self, path: impl AsRef<Path>) -> ManifestResult<()> {
        self.clear();
        let document = read_document(path.as_ref())?;
        self.load_version(&document);
        Ok(())
    }

    /// Reset to the empty, unloaded state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn load_version(&mut self, document: &Map<String, Value>) {
        self.manifest_file_url = string_field(document, KEY_MANIFEST_URL);
        self.version_file_url = string_field(document, KEY_VERSION_URL);
        self.package_url = string_field(document, KEY_PACKAGE_URL);
        self.version_id = string_field(document, KEY_VERSION);
        self.engine_version = string_field(document, KEY_ENGINE_VERSION);

        if let Some(Value::Object(groups)) = document.get(KEY_GROUP_VERSIONS) {
            for (group, version) in groups {
                let version = version.as_str().unwrap_or(DEFAULT_GROUP_VERSION);
                self.groups.push(group.clone());
                self.group_versions.insert(group.clone(), version.to_string());
            }
        }

        if let Some(Value::Array(paths)) = document.get(KEY_SEARCH_PATHS) {
            self.search_paths = paths
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }

        self.version_loaded = true;
    }

    fn load_full(&mut self, document: Map<String, Value>) {
        self.load_version(&document);

        if let Some(Value::Object(assets)) = document.get(KEY_ASSETS) {
            for (key, entry) in assets {
                match parse_asset(entry) {
                    Some(asset) => {
                        self.assets.insert(key.clone(), asset);
                    }
                    None => {
                        tracing::warn!(key = %key, "skipping asset entry without a path");
                    }
                }
            }
        }

        self.loaded = true;
    }

    /// Whether the version metadata has been loaded.
    pub fn is_version_loaded(&self) -> bool {
        self.version_loaded
    }

    /// Whether the full asset table has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    pub fn engine_version(&self) -> &str {
        &self.engine_version
    }

    /// URL of the small remote version file, empty if none is published.
    pub fn version_file_url(&self) -> &str {
        &self.version_file_url
    }

    /// URL of the full remote manifest, empty if none is published.
    pub fn manifest_file_url(&self) -> &str {
        &self.manifest_file_url
    }

    /// Base URL that asset paths are appended to.
    pub fn package_url(&self) -> &str {
        &self.package_url
    }

    /// Group names in document order.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn group_version(&self, group: &str) -> Option<&str> {
        self.group_versions.get(group).map(String::as_str)
    }

    /// Relative directories to register for lookups, in document order.
    pub fn search_paths(&self) -> &[String] {
        &self.search_paths
    }

    pub fn assets(&self) -> &BTreeMap<String, Asset> {
        &self.assets
    }

    pub fn asset(&self, key: &str) -> Option<&Asset> {
        self.assets.get(key)
    }

    pub(crate) fn set_asset_updating(&mut self, key: &str, updating: bool) {
        if let Some(asset) = self.assets.get_mut(key) {
            asset.set_updating(updating);
        }
    }

    /// Compare versions by exact string equality.
    ///
    /// The version ids must match, and every group known to both manifests
    /// must carry the same group version.
    pub fn version_equals(&self, other: &Manifest) -> bool {
        if self.version_id != other.version_id {
            return false;
        }

        self.group_versions.iter().all(|(group, version)| {
            other
                .group_versions
                .get(group)
                .map_or(true, |theirs| theirs == version)
        })
    }

    /// Render the manifest as a JSON document.
    pub fn to_json_string(&self) -> ManifestResult<String> {
        let document = ManifestDocument {
            version: &self.version_id,
            engine_version: &self.engine_version,
            package_url: &self.package_url,
            remote_manifest_url: &self.manifest_file_url,
            remote_version_url: &self.version_file_url,
            group_versions: self
                .groups
                .iter()
                .filter_map(|g| {
                    let version = self.group_versions.get(g)?;
                    Some((g.clone(), Value::String(version.clone())))
                })
                .collect(),
            search_paths: &self.search_paths,
            assets: &self.assets,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestDocument<'a> {
    version: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    engine_version: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    package_url: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    remote_manifest_url: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    remote_version_url: &'a str,
    #[serde(skip_serializing_if = "Map::is_empty")]
    group_versions: Map<String, Value>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    search_paths: &'a [String],
    assets: &'a BTreeMap<String, Asset>,
}

fn read_document(path: &Path) -> ManifestResult<Map<String, Value>> {
    let content = fs::read_to_string(path).map_err(|e| ManifestError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_document(&content)
}

fn parse_document(text: &str) -> ManifestResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) if map.is_empty() => Err(ManifestError::Empty),
        Value::Object(map) => Ok(map),
        _ => Err(ManifestError::NotAnObject),
    }
}

fn string_field(document: &Map<String, Value>, key: &str) -> String {
    document
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn parse_asset(entry: &Value) -> Option<Asset> {
    let entry = entry.as_object()?;
    let path = entry.get(KEY_PATH)?.as_str()?;
    Some(Asset::new(
        path,
        string_field(entry, KEY_MD5),
        string_field(entry, KEY_GROUP),
    ))
}
