//! Show command - displays information.

use anyhow::Result;

use recinstall::config::Config;
use recinstall::layout::{self, SUBVOLUMES};

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
    /// Show the subvolume layout that will be created
    Layout,
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Layout => {
            println!("Subvolume layout under {}:", config.target.display());
            for spec in &SUBVOLUMES {
                println!(
                    "  {:<11} {:<22} {}",
                    spec.subvol,
                    spec.target(&config.target).display(),
                    spec.mount_options()
                );
            }
            println!(
                "  {:<11} {:<22} {}",
                "(boot)",
                layout::boot_target(&config.target).display(),
                layout::BOOT_MOUNT_OPTIONS
            );
        }
    }
    Ok(())
}
