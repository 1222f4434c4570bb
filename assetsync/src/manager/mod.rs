//! Update orchestration.
//!
//! This module drives the update protocol for one storage root:
//! - The pure state machine (`state`)
//! - Outstanding-unit bookkeeping for a batch (`batch`)
//! - Notifications for the hosting application (`event`)
//! - The orchestrator that owns the manifests and performs effects
//!   (`assets_manager`)
//!
//! # Architecture
//!
//! ```text
//! AssetsManager ──step(Input, Facts)──► UpdateMachine
//!       ▲                                    │
//!       │ DownloadEvent (channel)            │ Vec<Effect>
//!       │                                    ▼
//!   Downloader threads ◄── fetch / batch ── perform(effect)
//!                                            │
//!                                            └── EventListener::on_event
//! ```
//!
//! # Example
//!
//! ```ignore
//! use assetsync::{AssetsManager, ManagerConfig, UpdateEvent};
//!
//! let config = ManagerConfig::new("/var/cache/game", "/opt/game/project.manifest");
//! let mut manager = AssetsManager::with_http(config, |event: &UpdateEvent| {
//!     println!("{}: {}", event.name(), event);
//! })?;
//!
//! manager.update();
//! manager.run_until_idle();
//! ```

mod assets_manager;
mod batch;
mod error;
mod event;
mod state;

pub use assets_manager::AssetsManager;
pub use error::{ManagerError, ManagerResult};
pub use event::{EventListener, UpdateErrorCode, UpdateEvent};
pub use state::{
    Comparison, Effect, Facts, Input, UpdateMachine, UpdateState, MANIFEST_ID, VERSION_ID,
};
