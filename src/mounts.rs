//! Mount table model.
//!
//! A [`MountTree`] is a snapshot of `/proc/self/mounts` (or any subset of it).
//! It is always re-read from the kernel before decisions are made; nothing
//! here caches state between stages.

use std::path::{Component, Path, PathBuf};

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    pub source: String,
    pub target: PathBuf,
    pub fstype: String,
    pub options: String,
}

impl MountRecord {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<PathBuf>,
        fstype: impl Into<String>,
        options: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            fstype: fstype.into(),
            options: options.into(),
        }
    }

    /// Number of normal path components in the mount target.
    pub fn depth(&self) -> usize {
        path_depth(&self.target)
    }

    /// True if the target is `root` itself or lies beneath it.
    ///
    /// Comparison is per path component: `/mntx` is not under `/mnt`.
    pub fn is_under(&self, root: &Path) -> bool {
        self.target.starts_with(root)
    }

    /// Value of a `key=value` mount option, e.g. `subvol`.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.split(',').find_map(|opt| {
            let (k, v) = opt.split_once('=')?;
            (k == key).then_some(v)
        })
    }
}

pub fn path_depth(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}

/// A set of active mounts, in mount-table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountTree {
    records: Vec<MountRecord>,
}

impl MountTree {
    pub fn from_records(records: Vec<MountRecord>) -> Self {
        Self { records }
    }

    /// Parse `/proc/mounts` format. Malformed lines are skipped.
    pub fn parse(table: &str) -> Self {
        let records = table
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let source = fields.next()?;
                let target = fields.next()?;
                let fstype = fields.next()?;
                let options = fields.next().unwrap_or("");
                Some(MountRecord::new(
                    unescape(source),
                    PathBuf::from(unescape(target)),
                    fstype,
                    options,
                ))
            })
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[MountRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &MountRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mounts at or beneath `root`, keeping table order.
    pub fn under(&self, root: &Path) -> MountTree {
        MountTree {
            records: self
                .records
                .iter()
                .filter(|r| r.is_under(root))
                .cloned()
                .collect(),
        }
    }

    /// Mounts whose source is `device`.
    pub fn mounted_from(&self, device: &str) -> MountTree {
        MountTree {
            records: self
                .records
                .iter()
                .filter(|r| r.source == device)
                .cloned()
                .collect(),
        }
    }

    pub fn find_target(&self, target: &Path) -> Option<&MountRecord> {
        self.records.iter().rev().find(|r| r.target == target)
    }

    pub fn is_mounted(&self, target: &Path) -> bool {
        self.find_target(target).is_some()
    }

    /// Targets in a safe unmount order: deepest first, and among equal
    /// depths the most recently mounted first.
    pub fn teardown_order(&self) -> Vec<PathBuf> {
        let mut records: Vec<&MountRecord> = self.records.iter().rev().collect();
        records.sort_by_key(|r| std::cmp::Reverse(r.depth()));
        records.into_iter().map(|r| r.target.clone()).collect()
    }
}

/// Decode the octal escapes the kernel uses for whitespace in mount paths.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/sda2 /mnt btrfs rw,noatime,compress=zstd:3,space_cache=v2,subvolid=256,subvol=/@ 0 0
/dev/sda2 /mnt/home btrfs rw,noatime,compress=zstd:3,subvolid=257,subvol=/@home 0 0
/dev/sda1 /mnt/boot vfat rw,relatime,fmask=0077,dmask=0077 0 0
/dev/sdb1 /mntx ext4 rw,relatime 0 0
/dev/sdc1 /media/usb\\040stick vfat rw 0 0
";

    #[test]
    fn parse_reads_all_fields() {
        let tree = MountTree::parse(SAMPLE);
        assert_eq!(tree.len(), 6);
        let home = &tree.records()[2];
        assert_eq!(home.source, "/dev/sda2");
        assert_eq!(home.target, PathBuf::from("/mnt/home"));
        assert_eq!(home.fstype, "btrfs");
        assert_eq!(home.option("subvol"), Some("/@home"));
        assert_eq!(home.option("compress"), Some("zstd:3"));
    }

    #[test]
    fn parse_decodes_octal_escapes() {
        let tree = MountTree::parse(SAMPLE);
        assert!(tree.is_mounted(Path::new("/media/usb stick")));
    }

    #[test]
    fn under_uses_component_prefix() {
        let tree = MountTree::parse(SAMPLE).under(Path::new("/mnt"));
        let targets: Vec<_> = tree.iter().map(|r| r.target.clone()).collect();
        assert_eq!(
            targets,
            vec![
                PathBuf::from("/mnt"),
                PathBuf::from("/mnt/home"),
                PathBuf::from("/mnt/boot"),
            ]
        );
    }

    #[test]
    fn teardown_order_is_deepest_first() {
        let tree = MountTree::from_records(vec![
            MountRecord::new("/dev/sda2", "/mnt", "btrfs", ""),
            MountRecord::new("/dev/sda1", "/mnt/boot", "vfat", ""),
            MountRecord::new("/dev/sda2", "/mnt/home", "btrfs", ""),
            MountRecord::new("/dev/sda2", "/mnt/var/log", "btrfs", ""),
        ]);
        assert_eq!(
            tree.teardown_order(),
            vec![
                PathBuf::from("/mnt/var/log"),
                PathBuf::from("/mnt/home"),
                PathBuf::from("/mnt/boot"),
                PathBuf::from("/mnt"),
            ]
        );
    }

    #[test]
    fn mounted_from_filters_by_source() {
        let tree = MountTree::parse(SAMPLE);
        assert_eq!(tree.mounted_from("/dev/sda2").len(), 2);
        assert!(tree.mounted_from("/dev/sdz9").is_empty());
    }

    #[test]
    fn depth_ignores_root_and_trailing_slash() {
        assert_eq!(path_depth(Path::new("/")), 0);
        assert_eq!(path_depth(Path::new("/mnt/")), 1);
        assert_eq!(path_depth(Path::new("/mnt/var/cache")), 3);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let tree = MountTree::parse("garbage\n\n/dev/sda1 /boot vfat rw 0 0\n");
        assert_eq!(tree.len(), 1);
    }
}
