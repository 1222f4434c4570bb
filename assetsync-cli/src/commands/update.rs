//! `check` and `update` commands.

use assetsync::{AssetsManager, UpdateState};
use tracing::info;

use super::ConfigArgs;
use crate::error::CliError;
use crate::progress::UpdateProgress;

/// Check the remote version without downloading assets.
pub fn check(args: &ConfigArgs, quiet: bool) -> Result<(), CliError> {
    let progress = UpdateProgress::new(quiet);
    let mut manager = AssetsManager::with_http(args.resolve()?, progress.listener())?;

    manager.check_update();
    manager.run_until_idle();

    let local = manager.local_manifest();
    match manager.update_state() {
        UpdateState::UpToDate => {
            progress.finish("up to date");
            println!("Up to date (version {})", local.version_id());
            Ok(())
        }
        UpdateState::NeedUpdate => {
            progress.finish("update available");
            let remote = manager.remote_manifest().version_id();
            println!("Update available: {} -> {}", local.version_id(), remote);
            Ok(())
        }
        state => Err(CliError::Update(format!(
            "version check did not finish ({}, {} errors)",
            state,
            progress.error_count()
        ))),
    }
}

/// Download the remote version, retrying failed assets up to `retries` times.
pub fn update(args: &ConfigArgs, retries: u32, quiet: bool) -> Result<(), CliError> {
    let progress = UpdateProgress::new(quiet);
    let mut manager = AssetsManager::with_http(args.resolve()?, progress.listener())?;

    manager.update();
    manager.run_until_idle();

    let mut attempt = 0;
    while manager.update_state() == UpdateState::Updating && attempt < retries {
        attempt += 1;
        info!(
            attempt,
            failed = manager.failed_units().len(),
            "retrying failed assets"
        );
        manager.update();
        manager.run_until_idle();
    }

    match manager.update_state() {
        UpdateState::UpToDate => {
            progress.finish("done");
            println!(
                "Up to date (version {})",
                manager.local_manifest().version_id()
            );
            Ok(())
        }
        UpdateState::Updating => Err(CliError::Update(format!(
            "{} assets failed: {}",
            manager.failed_units().len(),
            manager.failed_units().join(", ")
        ))),
        state => Err(CliError::Update(format!(
            "stopped in state {} with {} errors",
            state,
            progress.error_count()
        ))),
    }
}
