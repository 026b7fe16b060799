//! Block device discovery and classification.
//!
//! Devices are enumerated from `lsblk` JSON output and sorted into boot
//! candidates (FAT32) and root candidates (any supported Linux filesystem).
//! Classification is a pure function so it can be tested without touching
//! the host.

use std::fmt;

use serde::Deserialize;

use crate::error::{InstallError, Result};

/// Arguments passed to `lsblk` to enumerate partitions.
pub const LSBLK_ARGS: &[&str] = &[
    "--json",
    "--list",
    "--bytes",
    "--output",
    "PATH,FSTYPE,SIZE,TYPE",
];

/// Filesystem signature detected on a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsType {
    Fat32,
    Ext4,
    Btrfs,
    Xfs,
    F2fs,
    Swap,
    Other(String),
    None,
}

impl FsType {
    /// Map an `lsblk` / `blkid` FSTYPE string.
    pub fn from_signature(signature: Option<&str>) -> Self {
        match signature.map(str::trim) {
            None | Some("") => FsType::None,
            Some("vfat") | Some("fat32") => FsType::Fat32,
            Some("ext4") => FsType::Ext4,
            Some("btrfs") => FsType::Btrfs,
            Some("xfs") => FsType::Xfs,
            Some("f2fs") => FsType::F2fs,
            Some("swap") => FsType::Swap,
            Some(other) => FsType::Other(other.to_string()),
        }
    }

    pub fn is_boot_capable(&self) -> bool {
        matches!(self, FsType::Fat32)
    }

    pub fn is_root_capable(&self) -> bool {
        matches!(
            self,
            FsType::Ext4 | FsType::Btrfs | FsType::Xfs | FsType::F2fs
        )
    }
}

impl fmt::Display for FsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsType::Fat32 => f.write_str("fat32"),
            FsType::Ext4 => f.write_str("ext4"),
            FsType::Btrfs => f.write_str("btrfs"),
            FsType::Xfs => f.write_str("xfs"),
            FsType::F2fs => f.write_str("f2fs"),
            FsType::Swap => f.write_str("swap"),
            FsType::Other(name) => f.write_str(name),
            FsType::None => f.write_str("none"),
        }
    }
}

/// A partition node as seen at discovery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub path: String,
    pub fstype: FsType,
    pub size_bytes: u64,
}

impl BlockDevice {
    pub fn new(path: impl Into<String>, fstype: FsType, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            fstype,
            size_bytes,
        }
    }

    /// Human-readable size (binary units).
    pub fn size_display(&self) -> String {
        const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
        let mut size = self.size_bytes as f64;
        let mut unit = 0;
        while size >= 1024.0 && unit < UNITS.len() - 1 {
            size /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            format!("{} {}", self.size_bytes, UNITS[0])
        } else {
            format!("{:.1} {}", size, UNITS[unit])
        }
    }
}

/// Boot and root candidate lists. Disjoint by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates {
    pub boot: Vec<BlockDevice>,
    pub root: Vec<BlockDevice>,
}

impl Candidates {
    pub fn boot_contains(&self, path: &str) -> bool {
        self.boot.iter().any(|d| d.path == path)
    }

    pub fn root_contains(&self, path: &str) -> bool {
        self.root.iter().any(|d| d.path == path)
    }
}

/// Sort devices into boot and root candidates.
///
/// Fails with `NoCandidateFound` when either list ends up empty.
pub fn classify_devices(devices: &[BlockDevice]) -> Result<Candidates> {
    let boot: Vec<BlockDevice> = devices
        .iter()
        .filter(|d| d.fstype.is_boot_capable())
        .cloned()
        .collect();
    let root: Vec<BlockDevice> = devices
        .iter()
        .filter(|d| d.fstype.is_root_capable())
        .cloned()
        .collect();

    if boot.is_empty() {
        return Err(InstallError::NoCandidateFound {
            kind: "boot",
            hint: "create a FAT32 EFI system partition first (mkfs.fat -F 32)",
        });
    }
    if root.is_empty() {
        return Err(InstallError::NoCandidateFound {
            kind: "root",
            hint: "create a root partition formatted as ext4, btrfs, xfs or f2fs first",
        });
    }

    Ok(Candidates { boot, root })
}

/// Resolve a 1-based index typed by the operator.
pub fn select_candidate<'a>(candidates: &'a [BlockDevice], input: &str) -> Result<&'a BlockDevice> {
    let invalid = || InstallError::InvalidSelection {
        input: input.trim().to_string(),
        max: candidates.len(),
    };
    let index: usize = input.trim().parse().map_err(|_| invalid())?;
    if index == 0 || index > candidates.len() {
        return Err(invalid());
    }
    Ok(&candidates[index - 1])
}

#[derive(Debug, Deserialize)]
struct LsblkOutput {
    blockdevices: Vec<LsblkEntry>,
}

#[derive(Debug, Deserialize)]
struct LsblkEntry {
    path: Option<String>,
    fstype: Option<String>,
    size: Option<LsblkSize>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    children: Vec<LsblkEntry>,
}

/// Older util-linux prints sizes as strings even with `--bytes`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LsblkSize {
    Bytes(u64),
    Text(String),
}

impl LsblkSize {
    fn bytes(&self) -> u64 {
        match self {
            LsblkSize::Bytes(n) => *n,
            LsblkSize::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }
}

/// Parse `lsblk --json` output into partition devices.
///
/// Whole disks, loop devices and ROM drives are skipped; only `part` nodes
/// can be formatted by the installer.
pub fn parse_lsblk(json: &str) -> Result<Vec<BlockDevice>> {
    let parsed: LsblkOutput = serde_json::from_str(json).map_err(|e| {
        InstallError::io(
            "parsing lsblk output",
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })?;

    let mut devices = Vec::new();
    collect_partitions(&parsed.blockdevices, &mut devices);
    Ok(devices)
}

fn collect_partitions(entries: &[LsblkEntry], out: &mut Vec<BlockDevice>) {
    for entry in entries {
        if entry.kind.as_deref() == Some("part") {
            if let Some(path) = &entry.path {
                out.push(BlockDevice {
                    path: path.clone(),
                    fstype: FsType::from_signature(entry.fstype.as_deref()),
                    size_bytes: entry.size.as_ref().map(LsblkSize::bytes).unwrap_or(0),
                });
            }
        }
        collect_partitions(&entry.children, out);
    }
}

/// Print a numbered candidate list the way the prompts expect it.
pub fn print_candidates(title: &str, devices: &[BlockDevice]) {
    println!("{}:", title);
    for (i, device) in devices.iter().enumerate() {
        println!(
            "  {}) {:<16} {:<6} {}",
            i + 1,
            device.path,
            device.fstype,
            device.size_display()
        );
    }
}
