//! `status` command: describe the local manifest without touching the network.

use std::sync::Arc;

use assetsync::download::MemoryTransport;
use assetsync::AssetsManager;

use super::ConfigArgs;
use crate::error::CliError;
use crate::progress::UpdateProgress;

pub fn run(args: &ConfigArgs) -> Result<(), CliError> {
    let progress = UpdateProgress::new(true);
    // Status never fetches, so no network transport is needed.
    let manager = AssetsManager::new(
        args.resolve()?,
        Arc::new(MemoryTransport::new()),
        progress.listener(),
    )?;

    let local = manager.local_manifest();
    println!("Storage root:  {}", manager.storage_root().display());
    if !local.is_loaded() {
        println!("Local manifest: none");
        return Ok(());
    }

    println!("Version:       {}", local.version_id());
    if !local.engine_version().is_empty() {
        println!("Engine:        {}", local.engine_version());
    }
    println!("Assets:        {}", local.assets().len());
    println!("Manifest URL:  {}", local.manifest_file_url());
    println!("Version URL:   {}", local.version_file_url());
    for group in local.groups() {
        println!(
            "Group {}:  {}",
            group,
            local.group_version(group).unwrap_or_default()
        );
    }
    println!("Search paths:");
    for path in manager.search_paths() {
        println!("  {}", path.display());
    }
    Ok(())
}
