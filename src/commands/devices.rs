//! Devices command - lists installation candidates.

use anyhow::Result;

use recinstall::devices;
use recinstall::stages::discovery;
use recinstall::system::LinuxSystem;

/// Execute the devices command.
pub fn cmd_devices() -> Result<()> {
    let system = LinuxSystem::new();
    let candidates = discovery::discover(&system)?;
    devices::print_candidates("Boot partitions (FAT32)", &candidates.boot);
    println!();
    devices::print_candidates("Root partitions", &candidates.root);
    Ok(())
}
