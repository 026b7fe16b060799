//! Host implementation backed by util-linux, btrfs-progs and dosfstools.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::devices::{self, BlockDevice};
use crate::error::{InstallError, Result};
use crate::mounts::MountTree;
use crate::plan::{self, CpuVendor};
use crate::process::{self, Cmd};

use super::{Formatter, HostProbe, MountController, SwapController, UnmountOutcome};

const PROC_MOUNTS: &str = "/proc/self/mounts";
const PROC_MEMINFO: &str = "/proc/meminfo";
const PROC_CPUINFO: &str = "/proc/cpuinfo";
const EFI_FIRMWARE_DIR: &str = "/sys/firmware/efi";

/// umount(8) messages that mean the target is already unmounted. Only
/// reliable under the C locale, so umount always runs with `LC_ALL=C`.
const NOT_MOUNTED_MARKERS: &[&str] = &["not mounted", "no mount point specified"];

/// Whether umount's stderr says there was nothing to unmount.
pub fn is_not_mounted(stderr: &str) -> bool {
    NOT_MOUNTED_MARKERS.iter().any(|m| stderr.contains(m))
}

/// Tools whose stderr gets matched against English text.
fn untranslated(program: &str) -> Cmd {
    Cmd::new(program).env("LC_ALL", "C")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxSystem;

impl LinuxSystem {
    pub fn new() -> Self {
        Self
    }
}

fn read_proc(path: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| InstallError::io(format!("reading {path}"), e))
}

impl HostProbe for LinuxSystem {
    fn effective_uid(&self) -> u32 {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() }
    }

    fn uefi_firmware(&self) -> bool {
        Path::new(EFI_FIRMWARE_DIR).is_dir()
    }

    fn block_devices(&self) -> Result<Vec<BlockDevice>> {
        let result = process::run("lsblk", devices::LSBLK_ARGS)?;
        devices::parse_lsblk(&result.stdout)
    }

    fn mem_total_kib(&self) -> Result<u64> {
        let meminfo = read_proc(PROC_MEMINFO)?;
        plan::parse_mem_total_kib(&meminfo).ok_or_else(|| {
            InstallError::Environment(format!("no MemTotal line in {PROC_MEMINFO}"))
        })
    }

    fn cpu_vendor(&self) -> Result<CpuVendor> {
        Ok(CpuVendor::from_cpuinfo(&read_proc(PROC_CPUINFO)?))
    }
}

impl MountController for LinuxSystem {
    fn mount_table(&self) -> Result<MountTree> {
        Ok(MountTree::parse(&read_proc(PROC_MOUNTS)?))
    }

    fn mount(&self, source: &str, target: &Path, options: Option<&str>) -> Result<()> {
        let mut cmd = Cmd::new("mount");
        if let Some(options) = options {
            cmd = cmd.args(["-o", options]);
        }
        cmd.arg(source).arg_path(target).run()?;
        Ok(())
    }

    fn unmount(&self, target: &str) -> Result<UnmountOutcome> {
        let result = untranslated("umount").arg(target).allow_fail().run()?;
        if result.success() {
            return Ok(UnmountOutcome::Unmounted);
        }
        let stderr = result.stderr_trimmed();
        if is_not_mounted(stderr) {
            return Ok(UnmountOutcome::NotMounted);
        }
        Err(InstallError::ToolFailure {
            command: format!("umount {target}"),
            code: result.code(),
            stderr: stderr.to_string(),
        })
    }
}

impl Formatter for LinuxSystem {
    fn format_fat32(&self, device: &str) -> Result<()> {
        Cmd::new("mkfs.fat").args(["-F", "32", device]).run()?;
        Ok(())
    }

    fn format_btrfs(&self, device: &str) -> Result<()> {
        Cmd::new("mkfs.btrfs").args(["-f", device]).run()?;
        Ok(())
    }

    fn create_subvolume(&self, top_level: &Path, name: &str) -> Result<()> {
        Cmd::new("btrfs")
            .args(["subvolume", "create"])
            .arg_path(&top_level.join(name))
            .run()?;
        Ok(())
    }
}

impl SwapController for LinuxSystem {
    fn deactivate_all(&self) -> Result<()> {
        untranslated("swapoff").arg("-a").run()?;
        Ok(())
    }

    fn deactivate(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let result = untranslated("swapoff").arg_path(path).allow_fail().run()?;
        if !result.success() {
            // swapoff reports EINVAL for a file that is not an active swap area.
            tracing::debug!(path = %path.display(), stderr = result.stderr_trimmed(), "swapoff skipped");
        }
        Ok(())
    }

    fn prepare_nocow(&self, path: &Path) -> Result<()> {
        fs::File::create(path)
            .map_err(|e| InstallError::io(format!("truncating {}", path.display()), e))?;
        Cmd::new("chattr").arg("+C").arg_path(path).run()?;
        Ok(())
    }

    fn allocate(&self, path: &Path, bytes: u64) -> Result<()> {
        Cmd::new("fallocate")
            .args(["-l", bytes.to_string().as_str()])
            .arg_path(path)
            .run()?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| InstallError::io(format!("chmod 600 {}", path.display()), e))?;
        Ok(())
    }

    fn make_swap(&self, path: &Path) -> Result<()> {
        Cmd::new("mkswap").arg_path(path).run()?;
        Ok(())
    }

    fn activate(&self, path: &Path) -> Result<()> {
        Cmd::new("swapon").arg_path(path).run()?;
        Ok(())
    }
}
