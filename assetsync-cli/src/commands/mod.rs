//! CLI commands and shared configuration loading.

pub mod clean;
pub mod status;
pub mod update;

use std::path::PathBuf;

use assetsync::ManagerConfig;

use crate::error::CliError;

/// Name of the per-user configuration file.
const CONFIG_FILENAME: &str = "config.ini";

/// Configuration sources given on the command line.
#[derive(Debug, Default, Clone)]
pub struct ConfigArgs {
    pub config: Option<PathBuf>,
    pub storage: Option<PathBuf>,
    pub bundled: Option<PathBuf>,
    pub max_concurrent: Option<usize>,
}

impl ConfigArgs {
    /// Resolve the manager configuration.
    ///
    /// An explicit `--config` file must load. Otherwise the per-user
    /// `config.ini` is used when present. Command-line values override
    /// whatever the file says; with no file, `--bundled` is required and the
    /// storage root defaults to the user cache directory.
    pub fn resolve(&self) -> Result<ManagerConfig, CliError> {
        let file = match &self.config {
            Some(path) => Some(ManagerConfig::from_ini_file(path)?),
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Some(ManagerConfig::from_ini_file(path)?),
                None => None,
            },
        };

        let mut config = match (file, &self.bundled) {
            (Some(config), _) => config,
            (None, Some(bundled)) => {
                let storage = self
                    .storage
                    .clone()
                    .or_else(default_storage_root)
                    .ok_or_else(|| {
                        CliError::Config("no cache directory; pass --storage".to_string())
                    })?;
                ManagerConfig::new(storage, bundled)
            }
            (None, None) => {
                return Err(CliError::Config(
                    "no configuration file found; pass --config or --bundled".to_string(),
                ))
            }
        };

        if let Some(storage) = &self.storage {
            config.storage_root = storage.clone();
        }
        if let Some(bundled) = &self.bundled {
            config.bundled_manifest = bundled.clone();
        }
        if let Some(max) = self.max_concurrent {
            config = config.with_max_concurrent_downloads(max);
        }
        Ok(config)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("assetsync").join(CONFIG_FILENAME))
}

fn default_storage_root() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("assetsync"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_config_file_with_overrides() {
        let temp = TempDir::new().unwrap();
        let ini = temp.path().join("assetsync.ini");
        fs::write(
            &ini,
            "[storage]\nroot = /from/file\n[manifest]\nbundled = /app/project.manifest\n",
        )
        .unwrap();

        let args = ConfigArgs {
            config: Some(ini),
            max_concurrent: Some(3),
            storage: Some(PathBuf::from("/from/cli")),
            ..Default::default()
        };
        let config = args.resolve().unwrap();

        assert_eq!(config.storage_root, PathBuf::from("/from/cli"));
        assert_eq!(
            config.bundled_manifest,
            PathBuf::from("/app/project.manifest")
        );
        assert_eq!(config.max_concurrent_downloads, 3);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let args = ConfigArgs {
            config: Some(PathBuf::from("/nonexistent/assetsync.ini")),
            ..Default::default()
        };
        assert!(matches!(args.resolve(), Err(CliError::Config(_))));
    }

    #[test]
    fn test_bundled_and_storage_without_file() {
        let args = ConfigArgs {
            storage: Some(PathBuf::from("/cache")),
            bundled: Some(PathBuf::from("/app/project.manifest")),
            ..Default::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.storage_root, PathBuf::from("/cache"));
    }
}
