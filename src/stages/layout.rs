//! Layout mounting: root subvolume, secondary subvolumes, boot partition.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::error::{InstallError, Result};
use crate::layout::{self, SubvolumeSpec, BOOT_MOUNT_OPTIONS};
use crate::mounts::MountTree;
use crate::plan::InstallPlan;
use crate::system::MountController;

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| InstallError::io(format!("creating {}", path.display()), e))
}

fn mount_or_unexpected(
    mounts: &dyn MountController,
    source: &str,
    target: &Path,
    options: &str,
) -> Result<()> {
    mounts.mount(source, target, Some(options)).map_err(|e| {
        InstallError::UnexpectedMountState(format!(
            "mounting {} at {} ({}) failed: {}",
            source,
            target.display(),
            options,
            e
        ))
    })
}

fn mount_subvolume(
    mounts: &dyn MountController,
    device: &str,
    spec: &SubvolumeSpec,
    target_root: &Path,
) -> Result<()> {
    let target = spec.target(target_root);
    mount_or_unexpected(mounts, device, &target, &spec.mount_options())?;
    tracing::info!(subvol = spec.subvol, target = %target.display(), "mounted");
    Ok(())
}

/// Build the final mount tree under `target` and return it as observed in
/// the live mount table.
pub fn mount_layout(
    mounts: &dyn MountController,
    plan: &InstallPlan,
    target: &Path,
) -> Result<MountTree> {
    create_dir(target)?;
    mount_subvolume(mounts, &plan.root_device, layout::root_subvolume(), target)?;

    // Directory skeleton lives inside the root subvolume, so it must be
    // created after that mount and before any child mount.
    for spec in layout::secondary_subvolumes() {
        create_dir(&spec.target(target))?;
    }
    for spec in layout::secondary_subvolumes() {
        mount_subvolume(mounts, &plan.root_device, spec, target)?;
    }

    let boot = layout::boot_target(target);
    create_dir(&boot)?;
    // The mountpoint itself; the FAT contents are restricted by the mount masks.
    fs::set_permissions(&boot, fs::Permissions::from_mode(0o700))
        .map_err(|e| InstallError::io(format!("chmod 700 {}", boot.display()), e))?;
    mount_or_unexpected(mounts, &plan.boot_device, &boot, BOOT_MOUNT_OPTIONS)?;
    tracing::info!(device = %plan.boot_device, target = %boot.display(), "mounted boot partition");

    let tree = mounts.mount_table()?.under(target);
    verify_tree(&tree, plan, target)?;
    Ok(tree)
}

/// Every subvolume has an active mount from the root device and the boot
/// partition is mounted at the boot path.
pub fn verify_tree(tree: &MountTree, plan: &InstallPlan, target: &Path) -> Result<()> {
    let mut expected: Vec<(&str, std::path::PathBuf)> = layout::SUBVOLUMES
        .iter()
        .map(|spec| (plan.root_device.as_str(), spec.target(target)))
        .collect();
    expected.push((plan.boot_device.as_str(), layout::boot_target(target)));

    for (source, path) in expected {
        match tree.find_target(&path) {
            Some(record) if record.source == source => {}
            Some(record) => {
                return Err(InstallError::UnexpectedMountState(format!(
                    "{} is mounted from {}, expected {}",
                    path.display(),
                    record.source,
                    source
                )))
            }
            None => {
                return Err(InstallError::UnexpectedMountState(format!(
                    "{} is not mounted after layout",
                    path.display()
                )))
            }
        }
    }
    Ok(())
}
