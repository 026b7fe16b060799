//! Destructive formatting of the boot and root partitions.
//!
//! This is the one irreversible step. Nothing is written unless the live
//! mount table shows neither device mounted anywhere.

use std::thread;
use std::time::Duration;

use crate::devices::FsType;
use crate::error::{InstallError, Result};
use crate::plan::InstallPlan;
use crate::system::{Host, HostProbe};

use super::reconcile;

/// Current filesystem signature of `device`, read fresh from the host.
fn current_fstype(probe: &dyn HostProbe, device: &str) -> Result<FsType> {
    Ok(probe
        .block_devices()?
        .into_iter()
        .find(|d| d.path == device)
        .map(|d| d.fstype)
        .unwrap_or(FsType::None))
}

/// Release both devices, wait for the kernel to settle, then refuse to
/// continue if either is still mounted.
pub fn release_devices(host: &Host<'_>, plan: &InstallPlan, settle: Duration) -> Result<()> {
    for device in [&plan.boot_device, &plan.root_device] {
        if let Err(e) = host.mounts.unmount(device) {
            tracing::warn!(device = %device, "direct unmount failed: {}", e);
        }
    }

    if current_fstype(host.probe, &plan.root_device)? == FsType::Btrfs {
        let report = reconcile::unmount_device(host.mounts, &plan.root_device);
        tracing::debug!(
            device = %plan.root_device,
            released = report.unmounted.len(),
            "released subvolume mounts"
        );
    }

    if !settle.is_zero() {
        tracing::debug!(ms = settle.as_millis() as u64, "waiting for unmounts to settle");
        thread::sleep(settle);
    }

    let table = host.mounts.mount_table()?;
    for device in [&plan.root_device, &plan.boot_device] {
        if let Some(record) = table.mounted_from(device).iter().next() {
            return Err(InstallError::DeviceBusy {
                device: device.clone(),
                mountpoint: record.target.clone(),
            });
        }
    }
    Ok(())
}

/// FAT32 on the boot device, btrfs on the root device.
pub fn format(host: &Host<'_>, plan: &InstallPlan, settle: Duration) -> Result<()> {
    release_devices(host, plan, settle)?;

    println!("  Formatting {} as FAT32", plan.boot_device);
    host.formatter.format_fat32(&plan.boot_device)?;
    println!("  Formatting {} as btrfs", plan.root_device);
    host.formatter.format_btrfs(&plan.root_device)?;
    Ok(())
}
