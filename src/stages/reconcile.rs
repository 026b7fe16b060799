//! Mount-state reconciliation and teardown.
//!
//! Both directions are best-effort: "not mounted" is success, and any other
//! unmount failure is logged and recorded as a warning instead of aborting.
//! A first run on a clean machine legitimately has nothing to unmount.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::mounts::MountTree;
use crate::system::{MountController, SwapController, UnmountOutcome};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Targets actually unmounted, in the order they were released.
    pub unmounted: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl ReconcileReport {
    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Unmount `targets` in the given order, recording outcomes in `report`.
fn unmount_each(mounts: &dyn MountController, targets: Vec<PathBuf>, report: &mut ReconcileReport) {
    for target in targets {
        match mounts.unmount(&target.to_string_lossy()) {
            Ok(UnmountOutcome::Unmounted) => {
                tracing::info!(target = %target.display(), "unmounted");
                report.unmounted.push(target);
            }
            Ok(UnmountOutcome::NotMounted) => {
                tracing::debug!(target = %target.display(), "already unmounted");
            }
            Err(e) => report.warn(format!("could not unmount {}: {}", target.display(), e)),
        }
    }
}

fn live_table(mounts: &dyn MountController, report: &mut ReconcileReport) -> Option<MountTree> {
    match mounts.mount_table() {
        Ok(table) => Some(table),
        Err(e) => {
            report.warn(format!("could not read mount table: {e}"));
            None
        }
    }
}

/// Unmount everything at or beneath `root`, deepest first.
pub fn unmount_tree(mounts: &dyn MountController, root: &Path) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    if let Some(table) = live_table(mounts, &mut report) {
        unmount_each(mounts, table.under(root).teardown_order(), &mut report);
    }
    report
}

/// Unmount every mountpoint whose source is `device`, deepest first.
///
/// Catches subvolumes of a previous run mounted outside the target tree.
pub fn unmount_device(mounts: &dyn MountController, device: &str) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    if let Some(table) = live_table(mounts, &mut report) {
        unmount_each(mounts, table.mounted_from(device).teardown_order(), &mut report);
    }
    report
}

/// Bring the target mountpoint to a fully unmounted state before formatting.
///
/// Swap goes first: an active swapfile pins its filesystem.
pub fn reconcile(
    mounts: &dyn MountController,
    swap: &dyn SwapController,
    target: &Path,
) -> ReconcileReport {
    let mut swap_warnings = ReconcileReport::default();
    if let Err(e) = swap.deactivate_all() {
        swap_warnings.warn(format!("could not deactivate swap: {e}"));
    }

    let mut report = unmount_tree(mounts, target);
    report.warnings.splice(0..0, swap_warnings.warnings);
    report
}

/// Final teardown: release the swapfile, then unmount the whole tree.
pub fn teardown(
    mounts: &dyn MountController,
    swap: &dyn SwapController,
    target: &Path,
    swapfile: Option<&Path>,
) -> ReconcileReport {
    let mut swap_warnings = ReconcileReport::default();
    if let Some(swapfile) = swapfile {
        if let Err(e) = swap.deactivate(swapfile) {
            swap_warnings.warn(format!("could not deactivate {}: {}", swapfile.display(), e));
        }
    }

    let mut report = unmount_tree(mounts, target);
    report.warnings.splice(0..0, swap_warnings.warnings);
    report
}

/// Fail if anything is still mounted under `target`.
pub fn ensure_unmounted(mounts: &dyn MountController, target: &Path) -> Result<()> {
    let remaining = mounts.mount_table()?.under(target);
    if let Some(record) = remaining.iter().next() {
        return Err(crate::error::InstallError::UnexpectedMountState(format!(
            "{} is still mounted at {}",
            record.source,
            record.target.display()
        )));
    }
    Ok(())
}
