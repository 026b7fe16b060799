//! The operator's resolved choices for one run.
//!
//! An [`InstallPlan`] is built once from CLI flags and prompts, validated,
//! and then only ever passed by reference into the pipeline stages.

use std::fmt;
use std::str::FromStr;

use crate::error::{InstallError, Result};

/// Packages installed into every target before vendor microcode and extras.
pub const BASE_PACKAGES: &[&str] = &[
    "base",
    "base-devel",
    "linux",
    "linux-firmware",
    "btrfs-progs",
    "networkmanager",
    "sudo",
    "vim",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuVendor {
    Intel,
    Amd,
    Unknown,
}

impl CpuVendor {
    /// Read `vendor_id` from `/proc/cpuinfo` contents.
    pub fn from_cpuinfo(cpuinfo: &str) -> Self {
        let vendor = cpuinfo.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            (key.trim() == "vendor_id").then(|| value.trim())
        });
        match vendor {
            Some("GenuineIntel") => CpuVendor::Intel,
            Some("AuthenticAMD") => CpuVendor::Amd,
            _ => CpuVendor::Unknown,
        }
    }

    pub fn microcode_package(&self) -> Option<&'static str> {
        match self {
            CpuVendor::Intel => Some("intel-ucode"),
            CpuVendor::Amd => Some("amd-ucode"),
            CpuVendor::Unknown => None,
        }
    }
}

/// Desktop environment layered on the base system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Desktop {
    Gnome,
    Kde,
    Xfce,
}

impl Desktop {
    pub fn packages(&self) -> &'static [&'static str] {
        match self {
            Desktop::Gnome => &["gnome", "gdm"],
            Desktop::Kde => &["plasma-meta", "konsole", "dolphin", "sddm"],
            Desktop::Xfce => &["xfce4", "xfce4-goodies", "lightdm", "lightdm-gtk-greeter"],
        }
    }

    /// systemd unit of the display manager to enable.
    pub fn display_manager(&self) -> &'static str {
        match self {
            Desktop::Gnome => "gdm",
            Desktop::Kde => "sddm",
            Desktop::Xfce => "lightdm",
        }
    }
}

impl fmt::Display for Desktop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Desktop::Gnome => "gnome",
            Desktop::Kde => "kde",
            Desktop::Xfce => "xfce",
        };
        f.write_str(name)
    }
}

impl FromStr for Desktop {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gnome" => Ok(Desktop::Gnome),
            "kde" | "plasma" => Ok(Desktop::Kde),
            "xfce" => Ok(Desktop::Xfce),
            other => Err(InstallError::InvalidInput {
                field: "desktop",
                reason: format!("unknown desktop '{other}' (expected gnome, kde or xfce)"),
            }),
        }
    }
}

/// Read `MemTotal` (KiB) from `/proc/meminfo` contents.
pub fn parse_mem_total_kib(meminfo: &str) -> Option<u64> {
    meminfo.lines().find_map(|line| {
        let rest = line.strip_prefix("MemTotal:")?;
        rest.split_whitespace().next()?.parse().ok()
    })
}

/// Lowercase login name: starts with a letter or `_`, then `[a-z0-9_-]`.
pub fn validate_username(name: &str) -> Result<()> {
    let invalid = |reason: &str| InstallError::InvalidInput {
        field: "username",
        reason: reason.to_string(),
    };
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid("must not be empty")),
        Some(c) if !(c.is_ascii_lowercase() || c == '_') => {
            return Err(invalid("must start with a lowercase letter or '_'"))
        }
        _ => {}
    }
    if name.len() > 32 {
        return Err(invalid("must be at most 32 characters"));
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-') {
        return Err(invalid("may only contain a-z, 0-9, '_' and '-'"));
    }
    if name == "root" {
        return Err(invalid("'root' is reserved"));
    }
    Ok(())
}

/// Single DNS label: 1-63 alphanumerics or `-`, no leading/trailing `-`.
pub fn validate_hostname(name: &str) -> Result<()> {
    let invalid = |reason: &str| InstallError::InvalidInput {
        field: "hostname",
        reason: reason.to_string(),
    };
    if name.is_empty() || name.len() > 63 {
        return Err(invalid("must be 1-63 characters"));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid("must not start or end with '-'"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid("may only contain letters, digits and '-'"));
    }
    Ok(())
}

/// glibc locale name such as `en_US.UTF-8` or `de_DE@euro`.
pub fn validate_locale(locale: &str) -> Result<()> {
    let ok = !locale.is_empty()
        && locale
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '@'));
    if !ok {
        return Err(InstallError::InvalidInput {
            field: "locale",
            reason: format!("'{locale}' is not a locale name like en_US.UTF-8"),
        });
    }
    Ok(())
}

/// Relative zoneinfo name such as `UTC` or `Europe/Berlin`.
pub fn validate_timezone(timezone: &str) -> Result<()> {
    let invalid = |reason: &str| InstallError::InvalidInput {
        field: "timezone",
        reason: format!("'{timezone}' {reason}"),
    };
    if timezone.is_empty() || timezone.starts_with('/') || timezone.ends_with('/') {
        return Err(invalid("is not a zoneinfo name like Europe/Berlin"));
    }
    if timezone.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
        return Err(invalid("must not contain empty, '.' or '..' components"));
    }
    if !timezone
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-' | '+'))
    {
        return Err(invalid("contains characters not used in zoneinfo names"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(InstallError::InvalidInput {
            field: "password",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Everything the pipeline needs to know about the run.
#[derive(Clone)]
pub struct InstallPlan {
    pub boot_device: String,
    pub root_device: String,
    pub username: String,
    password: String,
    pub hostname: String,
    pub cpu_vendor: CpuVendor,
    pub mem_total_kib: u64,
    pub locale: String,
    pub timezone: String,
    pub desktop: Option<Desktop>,
    pub extra_packages: Vec<String>,
}

/// Unvalidated inputs for [`InstallPlan::new`].
pub struct PlanInput {
    pub boot_device: String,
    pub root_device: String,
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub cpu_vendor: CpuVendor,
    pub mem_total_kib: u64,
    pub locale: String,
    pub timezone: String,
    pub desktop: Option<Desktop>,
    pub extra_packages: Vec<String>,
}

impl InstallPlan {
    pub fn new(input: PlanInput) -> Result<Self> {
        if input.boot_device == input.root_device {
            return Err(InstallError::InvalidInput {
                field: "devices",
                reason: format!(
                    "boot and root must be different partitions (both are {})",
                    input.boot_device
                ),
            });
        }
        validate_username(&input.username)?;
        validate_hostname(&input.hostname)?;
        validate_password(&input.password)?;
        validate_locale(&input.locale)?;
        validate_timezone(&input.timezone)?;

        Ok(Self {
            boot_device: input.boot_device,
            root_device: input.root_device,
            username: input.username,
            password: input.password,
            hostname: input.hostname,
            cpu_vendor: input.cpu_vendor,
            mem_total_kib: input.mem_total_kib,
            locale: input.locale,
            timezone: input.timezone,
            desktop: input.desktop,
            extra_packages: input.extra_packages,
        })
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn microcode_package(&self) -> Option<&'static str> {
        self.cpu_vendor.microcode_package()
    }

    /// Full package list handed to the package installer.
    pub fn packages(&self) -> Vec<String> {
        let mut packages: Vec<String> = BASE_PACKAGES.iter().map(|p| p.to_string()).collect();
        if let Some(ucode) = self.microcode_package() {
            packages.push(ucode.to_string());
        }
        if let Some(desktop) = self.desktop {
            packages.extend(desktop.packages().iter().map(|p| p.to_string()));
        }
        for extra in &self.extra_packages {
            if !packages.contains(extra) {
                packages.push(extra.clone());
            }
        }
        packages
    }
}

impl fmt::Debug for InstallPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallPlan")
            .field("boot_device", &self.boot_device)
            .field("root_device", &self.root_device)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("hostname", &self.hostname)
            .field("cpu_vendor", &self.cpu_vendor)
            .field("mem_total_kib", &self.mem_total_kib)
            .field("locale", &self.locale)
            .field("timezone", &self.timezone)
            .field("desktop", &self.desktop)
            .field("extra_packages", &self.extra_packages)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> PlanInput {
        PlanInput {
            boot_device: "/dev/sda1".into(),
            root_device: "/dev/sda2".into(),
            username: "alice".into(),
            password: "hunter2".into(),
            hostname: "workstation".into(),
            cpu_vendor: CpuVendor::Amd,
            mem_total_kib: 16 * 1024 * 1024,
            locale: "en_US.UTF-8".into(),
            timezone: "Europe/Berlin".into(),
            desktop: None,
            extra_packages: vec![],
        }
    }

    #[test]
    fn cpu_vendor_from_cpuinfo() {
        let intel = "processor\t: 0\nvendor_id\t: GenuineIntel\ncpu family\t: 6\n";
        let amd = "processor\t: 0\nvendor_id\t: AuthenticAMD\n";
        assert_eq!(CpuVendor::from_cpuinfo(intel), CpuVendor::Intel);
        assert_eq!(CpuVendor::from_cpuinfo(amd), CpuVendor::Amd);
        assert_eq!(CpuVendor::from_cpuinfo("processor : 0\n"), CpuVendor::Unknown);
        assert_eq!(CpuVendor::Intel.microcode_package(), Some("intel-ucode"));
        assert_eq!(CpuVendor::Unknown.microcode_package(), None);
    }

    #[test]
    fn mem_total_from_meminfo() {
        let meminfo = "MemTotal:       16318412 kB\nMemFree:         1234 kB\n";
        assert_eq!(parse_mem_total_kib(meminfo), Some(16318412));
        assert_eq!(parse_mem_total_kib("MemFree: 1 kB\n"), None);
    }

    #[test]
    fn usernames() {
        for ok in ["alice", "_svc", "bob-2", "a"] {
            assert!(validate_username(ok).is_ok(), "{ok} should be valid");
        }
        let too_long = "a".repeat(33);
        for bad in ["", "Alice", "1bob", "bob smith", "root", too_long.as_str()] {
            assert!(validate_username(bad).is_err(), "{bad} should be invalid");
        }
    }

    #[test]
    fn hostnames() {
        for ok in ["arch", "my-box-01", "A1"] {
            assert!(validate_hostname(ok).is_ok(), "{ok} should be valid");
        }
        let too_long = "h".repeat(64);
        for bad in ["", "-box", "box-", "my_box", "a.b", too_long.as_str()] {
            assert!(validate_hostname(bad).is_err(), "{bad} should be invalid");
        }
    }

    #[test]
    fn locales() {
        for ok in ["en_US.UTF-8", "C.UTF-8", "de_DE@euro", "sr_RS@latin"] {
            assert!(validate_locale(ok).is_ok(), "{ok} should be valid");
        }
        for bad in ["", "en US", "../etc", "en_US.UTF-8\nroot"] {
            assert!(validate_locale(bad).is_err(), "{bad} should be invalid");
        }
    }

    #[test]
    fn timezones() {
        for ok in ["UTC", "Europe/Berlin", "America/Argentina/Buenos_Aires", "Etc/GMT+3"] {
            assert!(validate_timezone(ok).is_ok(), "{ok} should be valid");
        }
        for bad in ["", "/etc/passwd", "Europe/", "../../etc/shadow", "Europe//Berlin", "UTC now"] {
            assert!(validate_timezone(bad).is_err(), "{bad} should be invalid");
        }
    }

    #[test]
    fn desktop_names_parse() {
        assert_eq!("GNOME".parse::<Desktop>().unwrap(), Desktop::Gnome);
        assert_eq!("plasma".parse::<Desktop>().unwrap(), Desktop::Kde);
        assert_eq!(Desktop::Xfce.to_string(), "xfce");
        let err = "lxqt".parse::<Desktop>().unwrap_err();
        assert!(matches!(err, InstallError::InvalidInput { field: "desktop", .. }));
    }

    #[test]
    fn desktop_packages_come_before_extras() {
        let mut with_desktop = input();
        with_desktop.desktop = Some(Desktop::Kde);
        with_desktop.extra_packages = vec!["sddm".into(), "git".into()];
        let packages = InstallPlan::new(with_desktop).unwrap().packages();
        assert!(packages.contains(&"plasma-meta".to_string()));
        assert_eq!(packages.iter().filter(|p| *p == "sddm").count(), 1);
        assert_eq!(packages.last().map(String::as_str), Some("git"));
    }

    #[test]
    fn plan_rejects_bad_timezone() {
        let mut bad = input();
        bad.timezone = "../shadow".into();
        assert!(matches!(
            InstallPlan::new(bad),
            Err(InstallError::InvalidInput { field: "timezone", .. })
        ));
    }

    #[test]
    fn plan_rejects_same_boot_and_root() {
        let mut same = input();
        same.root_device = same.boot_device.clone();
        let err = InstallPlan::new(same).unwrap_err();
        assert!(matches!(err, InstallError::InvalidInput { field: "devices", .. }));
    }

    #[test]
    fn packages_include_microcode_and_dedup_extras() {
        let mut with_extras = input();
        with_extras.extra_packages = vec!["sudo".into(), "git".into()];
        let plan = InstallPlan::new(with_extras).unwrap();
        let packages = plan.packages();
        assert!(packages.contains(&"amd-ucode".to_string()));
        assert_eq!(packages.iter().filter(|p| *p == "sudo").count(), 1);
        assert_eq!(packages.last().map(String::as_str), Some("git"));
    }

    #[test]
    fn debug_redacts_password() {
        let plan = InstallPlan::new(input()).unwrap();
        let debug = format!("{plan:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
