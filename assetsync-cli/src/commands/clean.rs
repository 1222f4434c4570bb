//! `clean` command: remove downloaded assets and cached manifests.

use std::sync::Arc;

use assetsync::download::MemoryTransport;
use assetsync::AssetsManager;

use super::ConfigArgs;
use crate::error::CliError;
use crate::progress::UpdateProgress;

pub fn run(args: &ConfigArgs) -> Result<(), CliError> {
    let progress = UpdateProgress::new(true);
    let mut manager = AssetsManager::new(
        args.resolve()?,
        Arc::new(MemoryTransport::new()),
        progress.listener(),
    )?;

    println!("Clearing storage at: {}", manager.storage_root().display());
    let removed = manager.clear_storage()?;
    println!(
        "Removed {} entries; now at bundled version {}",
        removed,
        manager.local_manifest().version_id()
    );
    Ok(())
}
