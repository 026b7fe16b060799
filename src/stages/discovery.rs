//! Device discovery stage.

use crate::devices::{self, Candidates};
use crate::error::{InstallError, Result};
use crate::plan::InstallPlan;
use crate::system::HostProbe;

/// Enumerate partitions and classify them.
pub fn discover(probe: &dyn HostProbe) -> Result<Candidates> {
    let devices = probe.block_devices()?;
    tracing::debug!(count = devices.len(), "enumerated partitions");
    devices::classify_devices(&devices)
}

/// Re-derive candidates from the live system and confirm the plan's
/// devices are still eligible. Device state may have changed since the
/// operator made the selection.
pub fn verify_selection(probe: &dyn HostProbe, plan: &InstallPlan) -> Result<Candidates> {
    let candidates = discover(probe)?;
    if !candidates.boot_contains(&plan.boot_device) {
        return Err(InstallError::InvalidInput {
            field: "boot device",
            reason: format!("{} is not a FAT32 partition", plan.boot_device),
        });
    }
    if !candidates.root_contains(&plan.root_device) {
        return Err(InstallError::InvalidInput {
            field: "root device",
            reason: format!(
                "{} is not formatted with a supported root filesystem",
                plan.root_device
            ),
        });
    }
    Ok(candidates)
}
