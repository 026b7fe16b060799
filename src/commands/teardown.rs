//! Teardown command - releases whatever an aborted run left mounted.

use anyhow::Result;

use recinstall::config::Config;
use recinstall::layout;
use recinstall::stages::{guard, reconcile};
use recinstall::system::LinuxSystem;

/// Execute the teardown command.
pub fn cmd_teardown(config: &Config) -> Result<()> {
    config.validate_target()?;
    let system = LinuxSystem::new();
    guard::require_root(&system)?;

    println!("=== Tearing down {} ===", config.target.display());
    let swapfile = layout::swapfile_path(&config.target);
    let mut report =
        reconcile::teardown(&system, &system, &config.target, Some(swapfile.as_path()));
    let scratch = reconcile::unmount_tree(&system, &config.scratch);
    report.unmounted.extend(scratch.unmounted);
    report.warnings.extend(scratch.warnings);
    for target in &report.unmounted {
        println!("  unmounted {}", target.display());
    }
    for warning in &report.warnings {
        println!("  [WARN] {warning}");
    }

    reconcile::ensure_unmounted(&system, &config.target)?;
    println!("{} is fully unmounted.", config.target.display());
    Ok(())
}
