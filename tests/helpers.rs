//! Shared test utilities for recinstall tests.
//!
//! `FakeSystem` implements every host capability in memory: a device list,
//! a mount table that mount/umount mutate, per-device subvolume sets and
//! active swap areas. Every call is logged as a shell-like string so tests
//! can assert ordering.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tempfile::TempDir;

use recinstall::config::Config;
use recinstall::devices::{BlockDevice, FsType};
use recinstall::error::{InstallError, Result};
use recinstall::external::{ChrootConfigurator, FstabGenerator, NetworkCheck, PackageInstaller};
use recinstall::mounts::{MountRecord, MountTree};
use recinstall::plan::{CpuVendor, InstallPlan, PlanInput};
use recinstall::system::{Formatter, HostProbe, MountController, SwapController, UnmountOutcome};

pub const BOOT: &str = "/dev/sda1";
pub const ROOT: &str = "/dev/sda2";
pub const GIB_KIB: u64 = 1024 * 1024;

#[derive(Debug, Default)]
pub struct FakeState {
    pub euid: u32,
    pub uefi: bool,
    pub mem_total_kib: u64,
    pub devices: Vec<BlockDevice>,
    pub mounts: Vec<MountRecord>,
    /// Subvolumes present on each btrfs device.
    pub subvolumes: HashMap<String, Vec<String>>,
    pub active_swaps: Vec<PathBuf>,
    pub calls: Vec<String>,
    /// Mountpoints that refuse to unmount (target is busy).
    pub sticky: HashSet<PathBuf>,
    /// Subvolume whose creation fails.
    pub fail_subvolume: Option<String>,
    /// Mount target whose mount fails.
    pub fail_mount_at: Option<PathBuf>,
}

pub struct FakeSystem {
    pub state: RefCell<FakeState>,
}

fn tool_failure(command: String, stderr: &str) -> InstallError {
    InstallError::ToolFailure {
        command,
        code: 32,
        stderr: stderr.to_string(),
    }
}

impl FakeSystem {
    /// Root, UEFI, 8 GiB of RAM, a FAT32 boot and an ext4 root partition.
    pub fn new() -> Self {
        let state = FakeState {
            euid: 0,
            uefi: true,
            mem_total_kib: 8 * GIB_KIB,
            devices: vec![
                BlockDevice::new(BOOT, FsType::Fat32, 512 * 1024 * 1024),
                BlockDevice::new(ROOT, FsType::Ext4, 64 * 1024 * 1024 * 1024),
            ],
            ..FakeState::default()
        };
        Self {
            state: RefCell::new(state),
        }
    }

    pub fn with_euid(self, euid: u32) -> Self {
        self.state.borrow_mut().euid = euid;
        self
    }

    pub fn without_uefi(self) -> Self {
        self.state.borrow_mut().uefi = false;
        self
    }

    pub fn with_device(self, device: BlockDevice) -> Self {
        self.state.borrow_mut().devices.push(device);
        self
    }

    /// Pre-existing mount, as left behind by an earlier run.
    pub fn with_mount(self, source: &str, target: &Path) -> Self {
        self.state
            .borrow_mut()
            .mounts
            .push(MountRecord::new(source, target, "btrfs", "rw"));
        self
    }

    pub fn with_sticky(self, target: &Path) -> Self {
        self.state.borrow_mut().sticky.insert(target.to_path_buf());
        self
    }

    pub fn failing_subvolume(self, name: &str) -> Self {
        self.state.borrow_mut().fail_subvolume = Some(name.to_string());
        self
    }

    pub fn failing_mount_at(self, target: &Path) -> Self {
        self.state.borrow_mut().fail_mount_at = Some(target.to_path_buf());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn mounted_under(&self, root: &Path) -> MountTree {
        MountTree::from_records(self.state.borrow().mounts.clone()).under(root)
    }

    pub fn active_swaps(&self) -> Vec<PathBuf> {
        self.state.borrow().active_swaps.clone()
    }

    pub fn subvolumes_on(&self, device: &str) -> Vec<String> {
        self.state
            .borrow()
            .subvolumes
            .get(device)
            .cloned()
            .unwrap_or_default()
    }

    fn log(&self, call: String) {
        self.state.borrow_mut().calls.push(call);
    }

    fn set_fstype(&self, device: &str, fstype: FsType) {
        let mut state = self.state.borrow_mut();
        if let Some(d) = state.devices.iter_mut().find(|d| d.path == device) {
            d.fstype = fstype;
        }
    }

    /// Device backing the mount at `target`, if any.
    fn source_of(&self, target: &Path) -> Option<String> {
        self.state
            .borrow()
            .mounts
            .iter()
            .rev()
            .find(|m| m.target == target)
            .map(|m| m.source.clone())
    }
}

impl HostProbe for FakeSystem {
    fn effective_uid(&self) -> u32 {
        self.state.borrow().euid
    }

    fn uefi_firmware(&self) -> bool {
        self.state.borrow().uefi
    }

    fn block_devices(&self) -> Result<Vec<BlockDevice>> {
        Ok(self.state.borrow().devices.clone())
    }

    fn mem_total_kib(&self) -> Result<u64> {
        Ok(self.state.borrow().mem_total_kib)
    }

    fn cpu_vendor(&self) -> Result<CpuVendor> {
        Ok(CpuVendor::Intel)
    }
}

impl MountController for FakeSystem {
    fn mount_table(&self) -> Result<MountTree> {
        Ok(MountTree::from_records(self.state.borrow().mounts.clone()))
    }

    fn mount(&self, source: &str, target: &Path, options: Option<&str>) -> Result<()> {
        let options = options.unwrap_or("rw");
        let command = format!("mount -o {} {} {}", options, source, target.display());
        self.log(command.clone());

        if self.state.borrow().fail_mount_at.as_deref() == Some(target) {
            return Err(tool_failure(command, "mount: special device busy"));
        }
        let subvol = options
            .split(',')
            .find_map(|opt| opt.strip_prefix("subvol="));
        if let Some(subvol) = subvol {
            if !self.subvolumes_on(source).iter().any(|s| s == subvol) {
                return Err(tool_failure(command, "mount: wrong fs type, bad option"));
            }
        }

        let fstype = self
            .state
            .borrow()
            .devices
            .iter()
            .find(|d| d.path == source)
            .map(|d| d.fstype.to_string())
            .unwrap_or_default();
        self.state
            .borrow_mut()
            .mounts
            .push(MountRecord::new(source, target, &fstype, options));
        Ok(())
    }

    fn unmount(&self, target: &str) -> Result<UnmountOutcome> {
        self.log(format!("umount {target}"));
        let mut state = self.state.borrow_mut();
        let path = Path::new(target);
        let index = state
            .mounts
            .iter()
            .rposition(|m| m.target == path)
            .or_else(|| state.mounts.iter().rposition(|m| m.source == target));
        let Some(index) = index else {
            return Ok(UnmountOutcome::NotMounted);
        };
        if state.sticky.contains(&state.mounts[index].target) {
            return Err(tool_failure(
                format!("umount {target}"),
                "umount: target is busy.",
            ));
        }
        state.mounts.remove(index);
        Ok(UnmountOutcome::Unmounted)
    }
}

impl Formatter for FakeSystem {
    fn format_fat32(&self, device: &str) -> Result<()> {
        self.log(format!("mkfs.fat -F 32 {device}"));
        self.set_fstype(device, FsType::Fat32);
        Ok(())
    }

    fn format_btrfs(&self, device: &str) -> Result<()> {
        self.log(format!("mkfs.btrfs -f {device}"));
        self.set_fstype(device, FsType::Btrfs);
        self.state.borrow_mut().subvolumes.insert(device.to_string(), Vec::new());
        Ok(())
    }

    fn create_subvolume(&self, top_level: &Path, name: &str) -> Result<()> {
        let command = format!("btrfs subvolume create {}", top_level.join(name).display());
        self.log(command.clone());
        if self.state.borrow().fail_subvolume.as_deref() == Some(name) {
            return Err(tool_failure(command, "ERROR: cannot create subvolume"));
        }
        let Some(device) = self.source_of(top_level) else {
            return Err(tool_failure(command, "ERROR: not a btrfs filesystem"));
        };
        let mut state = self.state.borrow_mut();
        let subvolumes = state.subvolumes.entry(device).or_default();
        if subvolumes.iter().any(|s| s == name) {
            return Err(tool_failure(command, "ERROR: target path already exists"));
        }
        subvolumes.push(name.to_string());
        Ok(())
    }
}

impl SwapController for FakeSystem {
    fn deactivate_all(&self) -> Result<()> {
        self.log("swapoff -a".to_string());
        self.state.borrow_mut().active_swaps.clear();
        Ok(())
    }

    fn deactivate(&self, path: &Path) -> Result<()> {
        self.log(format!("swapoff {}", path.display()));
        self.state.borrow_mut().active_swaps.retain(|p| p != path);
        Ok(())
    }

    fn prepare_nocow(&self, path: &Path) -> Result<()> {
        self.log(format!("chattr +C {}", path.display()));
        Ok(())
    }

    fn allocate(&self, path: &Path, bytes: u64) -> Result<()> {
        self.log(format!("fallocate -l {} {}", bytes, path.display()));
        Ok(())
    }

    fn make_swap(&self, path: &Path) -> Result<()> {
        self.log(format!("mkswap {}", path.display()));
        Ok(())
    }

    fn activate(&self, path: &Path) -> Result<()> {
        self.log(format!("swapon {}", path.display()));
        self.state.borrow_mut().active_swaps.push(path.to_path_buf());
        Ok(())
    }
}

/// What the external collaborators saw while the tree was mounted.
#[derive(Debug, Default)]
pub struct ToolsSeen {
    pub packages: Vec<String>,
    pub mounts_at_install: usize,
    pub swaps_at_install: Vec<PathBuf>,
    pub network_checked: bool,
    pub fstab_generated: bool,
    pub configured: Option<(String, String)>,
}

/// External collaborators that snapshot the fake host instead of running
/// pacstrap/genfstab/arch-chroot.
pub struct FakeTools<'a> {
    pub system: &'a FakeSystem,
    pub seen: RefCell<ToolsSeen>,
    pub fail_packages: bool,
    pub offline: bool,
    /// Raised while packages install, as a SIGINT handler would.
    pub interrupt: Option<&'a AtomicBool>,
}

impl<'a> FakeTools<'a> {
    pub fn new(system: &'a FakeSystem) -> Self {
        Self {
            system,
            seen: RefCell::new(ToolsSeen::default()),
            fail_packages: false,
            offline: false,
            interrupt: None,
        }
    }

    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn interrupting_packages(mut self, flag: &'a AtomicBool) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn failing_packages(mut self) -> Self {
        self.fail_packages = true;
        self
    }
}

impl NetworkCheck for FakeTools<'_> {
    fn check(&self) -> Result<()> {
        self.seen.borrow_mut().network_checked = true;
        if self.offline {
            return Err(InstallError::Environment(
                "no network: archlinux.org:443 is unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

impl PackageInstaller for FakeTools<'_> {
    fn install(&self, root: &Path, packages: &[String]) -> Result<()> {
        if let Some(flag) = self.interrupt {
            flag.store(true, Ordering::SeqCst);
        }
        let mut seen = self.seen.borrow_mut();
        seen.packages = packages.to_vec();
        seen.mounts_at_install = self.system.mounted_under(root).len();
        seen.swaps_at_install = self.system.active_swaps();
        if self.fail_packages {
            return Err(tool_failure(
                format!("pacstrap -K {}", root.display()),
                "error: failed to retrieve some files",
            ));
        }
        Ok(())
    }
}

impl FstabGenerator for FakeTools<'_> {
    fn generate(&self, _root: &Path) -> Result<()> {
        self.seen.borrow_mut().fstab_generated = true;
        Ok(())
    }
}

impl ChrootConfigurator for FakeTools<'_> {
    fn configure(&self, _root: &Path, root_device: &str, plan: &InstallPlan) -> Result<()> {
        self.seen.borrow_mut().configured =
            Some((root_device.to_string(), plan.hostname.clone()));
        Ok(())
    }
}

/// Temporary target and scratch directories with a zero settle delay.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    pub target: PathBuf,
    pub config: Config,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let target = temp_dir.path().join("mnt");
        let config = Config {
            target: target.clone(),
            scratch: temp_dir.path().join("top"),
            settle_delay: Duration::ZERO,
            ..Config::default()
        };
        Self {
            _temp_dir: temp_dir,
            target,
            config,
        }
    }
}

pub fn plan_for(boot: &str, root: &str) -> InstallPlan {
    InstallPlan::new(PlanInput {
        boot_device: boot.to_string(),
        root_device: root.to_string(),
        username: "alice".to_string(),
        password: "hunter2".to_string(),
        hostname: "archbox".to_string(),
        cpu_vendor: CpuVendor::Intel,
        mem_total_kib: 8 * GIB_KIB,
        locale: "en_US.UTF-8".to_string(),
        timezone: "UTC".to_string(),
        desktop: None,
        extra_packages: Vec::new(),
    })
    .expect("valid test plan")
}

pub fn default_plan() -> InstallPlan {
    plan_for(BOOT, ROOT)
}
