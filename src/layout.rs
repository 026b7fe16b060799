//! Static btrfs subvolume layout.
//!
//! The table is fixed: seven top-level subvolumes, each mounted at a path
//! relative to the target root. Order only matters for directory creation
//! (a parent directory comes before its children).

use std::path::{Path, PathBuf};

/// zstd level used for every compressed subvolume mount.
pub const ZSTD_LEVEL: u8 = 3;

/// Boot partition mount path, relative to the target root.
pub const BOOT_DIR: &str = "boot";

/// Owner-only access for the boot partition; FAT has no per-file modes,
/// so the restriction is expressed through the mount masks.
pub const BOOT_MOUNT_OPTIONS: &str = "fmask=0077,dmask=0077";

/// Swapfile location, relative to the target root.
pub const SWAPFILE: &str = "swap/swapfile";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Zstd(u8),
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubvolumeSpec {
    /// Short name used in logs (`var-log`).
    pub name: &'static str,
    /// On-disk subvolume name (`@var_log`).
    pub subvol: &'static str,
    /// Mount path relative to the target root; empty for the root itself.
    pub mount_path: &'static str,
    pub compression: Compression,
}

pub const SUBVOLUMES: [SubvolumeSpec; 7] = [
    SubvolumeSpec {
        name: "root",
        subvol: "@",
        mount_path: "",
        compression: Compression::Zstd(ZSTD_LEVEL),
    },
    SubvolumeSpec {
        name: "home",
        subvol: "@home",
        mount_path: "home",
        compression: Compression::Zstd(ZSTD_LEVEL),
    },
    SubvolumeSpec {
        name: "srv",
        subvol: "@srv",
        mount_path: "srv",
        compression: Compression::Zstd(ZSTD_LEVEL),
    },
    SubvolumeSpec {
        name: "var-log",
        subvol: "@var_log",
        mount_path: "var/log",
        compression: Compression::Zstd(ZSTD_LEVEL),
    },
    SubvolumeSpec {
        name: "var-cache",
        subvol: "@var_cache",
        mount_path: "var/cache",
        compression: Compression::Zstd(ZSTD_LEVEL),
    },
    SubvolumeSpec {
        name: "snapshots",
        subvol: "@snapshots",
        mount_path: ".snapshots",
        compression: Compression::Zstd(ZSTD_LEVEL),
    },
    // Swapfiles cannot live on compressed extents.
    SubvolumeSpec {
        name: "swap",
        subvol: "@swap",
        mount_path: "swap",
        compression: Compression::Disabled,
    },
];

impl SubvolumeSpec {
    pub fn is_root(&self) -> bool {
        self.mount_path.is_empty()
    }

    /// Absolute mount target under `root`.
    pub fn target(&self, root: &Path) -> PathBuf {
        if self.is_root() {
            root.to_path_buf()
        } else {
            root.join(self.mount_path)
        }
    }

    /// Mount options: no atime updates, compression policy, subvolume.
    pub fn mount_options(&self) -> String {
        let compress = match self.compression {
            Compression::Zstd(level) => format!("compress=zstd:{level}"),
            Compression::Disabled => "compress=no".to_string(),
        };
        format!("noatime,{},subvol={}", compress, self.subvol)
    }
}

/// The subvolume mounted at the target root.
pub fn root_subvolume() -> &'static SubvolumeSpec {
    &SUBVOLUMES[0]
}

/// Every subvolume except the root one, in table order.
pub fn secondary_subvolumes() -> impl Iterator<Item = &'static SubvolumeSpec> {
    SUBVOLUMES.iter().filter(|s| !s.is_root())
}

pub fn boot_target(root: &Path) -> PathBuf {
    root.join(BOOT_DIR)
}

pub fn swapfile_path(root: &Path) -> PathBuf {
    root.join(SWAPFILE)
}
