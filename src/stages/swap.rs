//! Swapfile sizing and activation.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::layout;
use crate::system::SwapController;

pub const KIB_PER_GIB: u64 = 1024 * 1024;

/// Smallest swapfile created, for hosts with less than half a GiB of RAM.
pub const MIN_SWAP_GIB: u64 = 1;

/// Physical memory in KiB rounded half-up to whole GiB.
pub fn swap_size_gib(mem_total_kib: u64) -> u64 {
    let rounded = mem_total_kib.saturating_add(KIB_PER_GIB / 2) / KIB_PER_GIB;
    rounded.max(MIN_SWAP_GIB)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapFile {
    pub path: PathBuf,
    pub size_gib: u64,
}

impl SwapFile {
    pub fn size_bytes(&self) -> u64 {
        self.size_gib.saturating_mul(1024 * 1024 * 1024)
    }
}

/// Create and activate `<target>/swap/swapfile`. The `swap` subvolume must
/// already be mounted.
pub fn provision(swap: &dyn SwapController, target: &Path, mem_total_kib: u64) -> Result<SwapFile> {
    let file = SwapFile {
        path: layout::swapfile_path(target),
        size_gib: swap_size_gib(mem_total_kib),
    };
    println!("  Creating {} GiB swapfile at {}", file.size_gib, file.path.display());

    swap.prepare_nocow(&file.path)?;
    swap.allocate(&file.path, file.size_bytes())?;
    swap.make_swap(&file.path)?;
    swap.activate(&file.path)?;
    Ok(file)
}
