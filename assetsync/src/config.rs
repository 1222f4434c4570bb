//! Configuration for the assets manager.
//!
//! Configuration is an explicit value handed to
//! [`AssetsManager`](crate::manager::AssetsManager) at construction. It can be
//! built in code or loaded from an INI file:
//!
//! ```text
//! [storage]
//! root = /home/player/.cache/mygame
//!
//! [manifest]
//! bundled = /opt/mygame/project.manifest
//!
//! [download]
//! max_concurrent = 8
//! low_speed_limit = 1
//! low_speed_time_secs = 5
//! connect_timeout_secs = 30
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::download::{StallPolicy, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_CONCURRENT};

/// Default bound on state-machine steps processed per call.
pub const DEFAULT_MAX_TRANSITION_STEPS: usize = 64;

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The INI file could not be read or parsed.
    #[error("failed to load config {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    /// The INI text could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] ini::ParseError),

    /// A required key is missing.
    #[error("missing required key [{section}] {key}")]
    Missing {
        section: &'static str,
        key: &'static str,
    },

    /// A key has a value of the wrong form.
    #[error("invalid value for [{section}] {key}: {value:?}")]
    Invalid {
        section: &'static str,
        key: &'static str,
        value: String,
    },
}

/// Configuration for the assets manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Writable directory holding cached manifests and downloaded assets.
    pub storage_root: PathBuf,

    /// Manifest shipped with the application.
    ///
    /// Used when no cached manifest exists under the storage root, or when
    /// the cached one cannot be parsed.
    pub bundled_manifest: PathBuf,

    /// Maximum transfers a batch runs at once.
    pub max_concurrent_downloads: usize,

    /// Minimum throughput before a transfer is considered stalled.
    pub stall_policy: StallPolicy,

    /// HTTP connection timeout.
    pub connect_timeout: Duration,

    /// Upper bound on state transitions processed by one call.
    ///
    /// Inputs beyond the bound are deferred to the next call, never dropped.
    pub max_transition_steps: usize,
}

impl ManagerConfig {
    /// Create a configuration with default download settings.
    pub fn new(storage_root: impl Into<PathBuf>, bundled_manifest: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            bundled_manifest: bundled_manifest.into(),
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT,
            stall_policy: StallPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_transition_steps: DEFAULT_MAX_TRANSITION_STEPS,
        }
    }

    /// Set the maximum concurrent transfers.
    pub fn with_max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent_downloads = max;
        self
    }

    /// Set the stalled-transfer policy.
    pub fn with_stall_policy(mut self, policy: StallPolicy) -> Self {
        self.stall_policy = policy;
        self
    }

    /// Set the HTTP connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-call transition bound (minimum 1).
    pub fn with_max_transition_steps(mut self, steps: usize) -> Self {
        self.max_transition_steps = steps.max(1);
        self
    }

    /// Load configuration from an INI file.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_ini(&ini)
    }

    /// Load configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text)?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let root = get(ini, "storage", "root").ok_or(ConfigError::Missing {
            section: "storage",
            key: "root",
        })?;
        let bundled = get(ini, "manifest", "bundled").ok_or(ConfigError::Missing {
            section: "manifest",
            key: "bundled",
        })?;

        let mut config = Self::new(root, bundled);

        if let Some(max) = parse(ini, "download", "max_concurrent")? {
            config.max_concurrent_downloads = max;
        }
        if let Some(limit) = parse(ini, "download", "low_speed_limit")? {
            config.stall_policy.min_bytes_per_sec = limit;
        }
        if let Some(secs) = parse(ini, "download", "low_speed_time_secs")? {
            config.stall_policy.window = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(ini, "download", "connect_timeout_secs")? {
            config.connect_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn get<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section))
        .and_then(|s| s.get(key))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse<T: FromStr>(
    ini: &Ini,
    section: &'static str,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match get(ini, section, key) {
        None => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| ConfigError::Invalid {
            section,
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let config = ManagerConfig::new("/cache", "/app/project.manifest");
        assert_eq!(config.max_concurrent_downloads, DEFAULT_MAX_CONCURRENT);
        assert_eq!(config.stall_policy, StallPolicy::default());
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.max_transition_steps, DEFAULT_MAX_TRANSITION_STEPS);
    }

    #[test]
    fn test_builder_pattern() {
        let config = ManagerConfig::new("/cache", "/app/project.manifest")
            .with_max_concurrent_downloads(2)
            .with_stall_policy(StallPolicy::new(512, Duration::from_secs(10)))
            .with_connect_timeout(Duration::from_secs(3))
            .with_max_transition_steps(8);

        assert_eq!(config.storage_root, PathBuf::from("/cache"));
        assert_eq!(config.max_concurrent_downloads, 2);
        assert_eq!(config.stall_policy.min_bytes_per_sec, 512);
        assert_eq!(config.connect_timeout.as_secs(), 3);
        assert_eq!(config.max_transition_steps, 8);
        assert_eq!(config.with_max_transition_steps(0).max_transition_steps, 1);
    }

    #[test]
    fn test_from_ini_str() {
        let config = ManagerConfig::from_ini_str(
            "[storage]\nroot = /var/cache/game\n\
             [manifest]\nbundled = /opt/game/project.manifest\n\
             [download]\nmax_concurrent = 4\nlow_speed_limit = 10\nlow_speed_time_secs = 20\n",
        )
        .unwrap();

        assert_eq!(config.storage_root, PathBuf::from("/var/cache/game"));
        assert_eq!(
            config.bundled_manifest,
            PathBuf::from("/opt/game/project.manifest")
        );
        assert_eq!(config.max_concurrent_downloads, 4);
        assert_eq!(config.stall_policy.min_bytes_per_sec, 10);
        assert_eq!(config.stall_policy.window, Duration::from_secs(20));
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_from_ini_missing_root() {
        let err = ManagerConfig::from_ini_str("[manifest]\nbundled = a\n").unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: "root", .. }));
    }

    #[test]
    fn test_from_ini_invalid_number() {
        let err = ManagerConfig::from_ini_str(
            "[storage]\nroot = /c\n[manifest]\nbundled = b\n[download]\nmax_concurrent = many\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_concurrent"));
    }

    #[test]
    fn test_from_ini_file_missing() {
        let err = ManagerConfig::from_ini_file("/nonexistent/assetsync.ini").unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }));
    }
}
