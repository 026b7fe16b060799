//! Host tool availability, per stage that shells out to it.

use crate::error::Stage;
use crate::process;

use super::types::Finding;

/// (tool, package, stage that runs it), in pipeline order.
pub const REQUIRED_TOOLS: &[(&str, &str, Stage)] = &[
    ("lsblk", "util-linux", Stage::Discovery),
    ("umount", "util-linux", Stage::Reconcile),
    ("swapoff", "util-linux", Stage::Reconcile),
    ("mkfs.fat", "dosfstools", Stage::Format),
    ("mkfs.btrfs", "btrfs-progs", Stage::Format),
    ("btrfs", "btrfs-progs", Stage::Subvolumes),
    ("mount", "util-linux", Stage::Layout),
    ("chattr", "e2fsprogs", Stage::Swap),
    ("fallocate", "util-linux", Stage::Swap),
    ("mkswap", "util-linux", Stage::Swap),
    ("swapon", "util-linux", Stage::Swap),
    ("pacstrap", "arch-install-scripts", Stage::Packages),
    ("genfstab", "arch-install-scripts", Stage::Fstab),
    ("arch-chroot", "arch-install-scripts", Stage::Chroot),
    ("blkid", "util-linux", Stage::Chroot),
];

pub fn check_host_tools() -> Vec<Finding> {
    REQUIRED_TOOLS
        .iter()
        .map(|(tool, package, stage)| locate(tool, package, *stage))
        .collect()
}

fn locate(tool: &str, package: &str, stage: Stage) -> Finding {
    match process::which(tool) {
        Some(path) => Finding::ready(stage, tool).noted(path),
        None => Finding::blocked(
            stage,
            tool,
            format!("not on PATH; install the '{package}' package"),
        ),
    }
}
