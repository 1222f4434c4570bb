//! AssetSync - manifest-driven incremental asset updates
//!
//! This library keeps a directory of application assets in step with a
//! remote manifest. It fetches a small version file first, then the full
//! manifest, downloads only the assets whose checksums changed, and promotes
//! the new manifest once every file has arrived.
//!
//! - [`manifest`]: parsing, version comparison and diffing
//! - [`download`]: streamed single and batch transfers over a [`download::Transport`]
//! - [`manager`]: the update state machine and its orchestrator
//! - [`config`]: configuration values and INI loading
//! - [`storage`]: guarded file access under the storage root

pub mod config;
pub mod download;
pub mod manager;
pub mod manifest;
pub mod storage;

pub use config::{ConfigError, ManagerConfig};
pub use manager::{AssetsManager, EventListener, ManagerError, UpdateEvent, UpdateState};
pub use manifest::Manifest;
