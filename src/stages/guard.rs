//! Privilege and firmware checks. Runs before anything touches a disk.

use crate::error::{InstallError, Result};
use crate::system::HostProbe;

pub fn require_root(probe: &dyn HostProbe) -> Result<()> {
    let euid = probe.effective_uid();
    if euid != 0 {
        return Err(InstallError::Privilege { euid });
    }
    Ok(())
}

/// systemd-boot needs a UEFI boot; BIOS/CSM boots are rejected.
pub fn require_uefi(probe: &dyn HostProbe) -> Result<()> {
    if !probe.uefi_firmware() {
        return Err(InstallError::Environment(
            "system was not booted in UEFI mode (/sys/firmware/efi missing)".to_string(),
        ));
    }
    Ok(())
}

pub fn check(probe: &dyn HostProbe) -> Result<()> {
    require_root(probe)?;
    require_uefi(probe)
}
