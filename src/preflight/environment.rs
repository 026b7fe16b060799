//! Install environment checks (privileges, firmware, network, memory, CPU).

use crate::error::Stage;
use crate::external::{NetworkCheck, MIRROR_ENDPOINT};
use crate::stages::swap;
use crate::system::HostProbe;

use super::types::Finding;

/// Hosts with less memory than this still install, but slowly.
const LOW_MEMORY_KIB: u64 = 1024 * 1024;

pub fn check_install_environment(probe: &dyn HostProbe, network: &dyn NetworkCheck) -> Vec<Finding> {
    let mut findings = Vec::new();

    let euid = probe.effective_uid();
    findings.push(if euid == 0 {
        Finding::ready(Stage::Guard, "root privileges")
    } else {
        Finding::blocked(
            Stage::Guard,
            "root privileges",
            format!("effective uid is {euid}; re-run with sudo"),
        )
    });

    findings.push(if probe.uefi_firmware() {
        Finding::ready(Stage::Guard, "UEFI firmware")
    } else {
        Finding::blocked(
            Stage::Guard,
            "UEFI firmware",
            "/sys/firmware/efi missing; boot the installer in UEFI mode",
        )
    });

    findings.push(match network.check() {
        Ok(()) => Finding::ready(Stage::Network, "package mirror").noted(MIRROR_ENDPOINT),
        Err(e) => Finding::blocked(Stage::Network, "package mirror", e.to_string()),
    });

    findings.push(match probe.mem_total_kib() {
        Ok(kib) if kib < LOW_MEMORY_KIB => Finding::degraded(
            Stage::Swap,
            "memory",
            format!("{} MiB; swapfile will be the 1 GiB minimum", kib / 1024),
        ),
        Ok(kib) => Finding::ready(Stage::Swap, "memory").noted(format!(
            "{} MiB, {} GiB swapfile",
            kib / 1024,
            swap::swap_size_gib(kib)
        )),
        Err(e) => Finding::blocked(Stage::Swap, "memory", e.to_string()),
    });

    findings.push(match probe.cpu_vendor() {
        Ok(vendor) => match vendor.microcode_package() {
            Some(ucode) => Finding::ready(Stage::Packages, "CPU microcode").noted(ucode),
            None => Finding::degraded(
                Stage::Packages,
                "CPU microcode",
                "unknown vendor; no microcode package will be installed",
            ),
        },
        Err(e) => Finding::degraded(Stage::Packages, "CPU microcode", e.to_string()),
    });

    findings
}
