//! Capability interfaces over the host.
//!
//! Stages never shell out directly; they talk to these traits. The real
//! implementation lives in [`linux`], tests substitute an in-memory fake.

pub mod linux;

use std::path::Path;

use crate::devices::BlockDevice;
use crate::error::Result;
use crate::mounts::MountTree;
use crate::plan::CpuVendor;

pub use linux::LinuxSystem;

/// Result of an unmount request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmountOutcome {
    Unmounted,
    /// Nothing was mounted there. Not an error.
    NotMounted,
}

/// Read-only facts about the running host.
pub trait HostProbe {
    fn effective_uid(&self) -> u32;
    /// True when the firmware booted this system in UEFI mode.
    fn uefi_firmware(&self) -> bool;
    fn block_devices(&self) -> Result<Vec<BlockDevice>>;
    fn mem_total_kib(&self) -> Result<u64>;
    fn cpu_vendor(&self) -> Result<CpuVendor>;
}

pub trait MountController {
    /// Live mount table, re-read on every call.
    fn mount_table(&self) -> Result<MountTree>;
    fn mount(&self, source: &str, target: &Path, options: Option<&str>) -> Result<()>;
    /// Unmount a mountpoint or a device node.
    fn unmount(&self, target: &str) -> Result<UnmountOutcome>;
}

pub trait Formatter {
    fn format_fat32(&self, device: &str) -> Result<()>;
    fn format_btrfs(&self, device: &str) -> Result<()>;
    fn create_subvolume(&self, top_level: &Path, name: &str) -> Result<()>;
}

pub trait SwapController {
    /// `swapoff -a`.
    fn deactivate_all(&self) -> Result<()>;
    /// Deactivate one swap area; inactive areas are not an error.
    fn deactivate(&self, path: &Path) -> Result<()>;
    /// Create or truncate `path` to zero length and mark it no-CoW.
    fn prepare_nocow(&self, path: &Path) -> Result<()>;
    /// Allocate `bytes` to `path` and restrict it to mode 0600.
    fn allocate(&self, path: &Path, bytes: u64) -> Result<()>;
    fn make_swap(&self, path: &Path) -> Result<()>;
    fn activate(&self, path: &Path) -> Result<()>;
}

/// All host capabilities a run needs, borrowed together.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub probe: &'a dyn HostProbe,
    pub mounts: &'a dyn MountController,
    pub formatter: &'a dyn Formatter,
    pub swap: &'a dyn SwapController,
}

impl<'a> Host<'a> {
    /// Borrow every capability from one implementation.
    pub fn from_system<S>(system: &'a S) -> Self
    where
        S: HostProbe + MountController + Formatter + SwapController,
    {
        Self {
            probe: system,
            mounts: system,
            formatter: system,
            swap: system,
        }
    }
}
