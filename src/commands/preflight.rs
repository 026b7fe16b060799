//! Preflight command - runs preflight checks.

use anyhow::Result;

use recinstall::external::ArchTools;
use recinstall::preflight;
use recinstall::system::LinuxSystem;

/// Execute the preflight command.
pub fn cmd_preflight(strict: bool) -> Result<()> {
    let system = LinuxSystem::new();
    let tools = ArchTools;
    println!("Running preflight checks...\n");
    if strict {
        preflight::run_preflight_or_fail(&system, &tools, true)?;
    } else {
        let report = preflight::run_preflight(&system, &tools);
        report.print();
        if !report.is_ready() {
            println!("Some checks failed. Use --strict to exit non-zero.");
        }
    }
    Ok(())
}
