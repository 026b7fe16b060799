//! Subvolume creation on the freshly formatted root filesystem.

use std::fs;
use std::path::Path;

use crate::error::{InstallError, Result};
use crate::layout::SUBVOLUMES;
use crate::system::{Formatter, MountController, UnmountOutcome};

/// Mount the top level of `root_device` at `scratch`, create every
/// subvolume in the layout, then release the scratch mount.
///
/// The first failed create aborts the stage; the scratch mount is released
/// either way. Returns the subvolume names created.
pub fn provision(
    mounts: &dyn MountController,
    formatter: &dyn Formatter,
    root_device: &str,
    scratch: &Path,
) -> Result<Vec<&'static str>> {
    fs::create_dir_all(scratch)
        .map_err(|e| InstallError::io(format!("creating {}", scratch.display()), e))?;
    mounts.mount(root_device, scratch, None).map_err(|e| {
        InstallError::UnexpectedMountState(format!(
            "cannot mount {} at {}: {}",
            root_device,
            scratch.display(),
            e
        ))
    })?;

    let created = create_all(formatter, scratch);

    match mounts.unmount(&scratch.to_string_lossy()) {
        Ok(UnmountOutcome::Unmounted) => {}
        Ok(UnmountOutcome::NotMounted) => {
            tracing::warn!(scratch = %scratch.display(), "scratch mount vanished before release");
        }
        Err(e) if created.is_ok() => return Err(e),
        Err(e) => tracing::warn!("releasing scratch mount failed: {}", e),
    }

    created
}

fn create_all(formatter: &dyn Formatter, top_level: &Path) -> Result<Vec<&'static str>> {
    let mut created = Vec::with_capacity(SUBVOLUMES.len());
    for spec in &SUBVOLUMES {
        formatter
            .create_subvolume(top_level, spec.subvol)
            .map_err(|e| {
                InstallError::UnexpectedMountState(format!(
                    "creating subvolume {} ({}) failed on a fresh filesystem: {}",
                    spec.subvol, spec.name, e
                ))
            })?;
        tracing::debug!(subvol = spec.subvol, "created subvolume");
        created.push(spec.subvol);
    }
    Ok(created)
}
