//! Preflight checks for an install run.
//!
//! Checks each stage's host-side preconditions (privileges, firmware,
//! network, host tools) before anything touches a disk. Run with
//! `recinstall preflight` to see where a real install would stop.

mod environment;
mod host_tools;
mod types;

use anyhow::{bail, Result};

use crate::external::NetworkCheck;
use crate::system::HostProbe;

pub use host_tools::REQUIRED_TOOLS;
pub use types::{Finding, PreflightReport, Verdict};

/// Run all preflight checks.
pub fn run_preflight(probe: &dyn HostProbe, network: &dyn NetworkCheck) -> PreflightReport {
    let mut findings = environment::check_install_environment(probe, network);
    findings.extend(host_tools::check_host_tools());
    PreflightReport::new(findings)
}

/// Run preflight and bail if any stage is blocked. With `strict`, warnings
/// count as failures too.
pub fn run_preflight_or_fail(
    probe: &dyn HostProbe,
    network: &dyn NetworkCheck,
    strict: bool,
) -> Result<()> {
    let report = run_preflight(probe, network);
    report.print();

    if let Some(stage) = report.first_blocked_stage() {
        bail!(
            "Preflight failed: an install would abort at {} ({} blocking check(s)).",
            stage,
            report.blocked_count()
        );
    }
    if strict && report.degraded_count() > 0 {
        bail!(
            "Preflight failed in strict mode: {} warning(s).",
            report.degraded_count()
        );
    }

    println!("All preflight checks passed!\n");
    Ok(())
}
