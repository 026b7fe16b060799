//! External collaborators invoked after the mount tree is in place.
//!
//! The core only guarantees preconditions (tree mounted, root populated);
//! what these services do inside the target is their own business. The
//! default implementations wrap the Arch install scripts.

use std::fs;
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::os::unix::fs::symlink;
use std::path::Path;
use std::time::Duration;

use crate::error::{InstallError, Result};
use crate::plan::InstallPlan;
use crate::process::Cmd;

/// Package mirror used to decide whether the network is usable.
pub const MIRROR_ENDPOINT: &str = "archlinux.org:443";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub trait NetworkCheck {
    /// Ok when the package mirrors can be reached.
    fn check(&self) -> Result<()>;
}

pub trait PackageInstaller {
    fn install(&self, root: &Path, packages: &[String]) -> Result<()>;
}

pub trait FstabGenerator {
    fn generate(&self, root: &Path) -> Result<()>;
}

pub trait ChrootConfigurator {
    fn configure(&self, root: &Path, root_device: &str, plan: &InstallPlan) -> Result<()>;
}

/// All collaborators, borrowed together.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub network: &'a dyn NetworkCheck,
    pub packages: &'a dyn PackageInstaller,
    pub fstab: &'a dyn FstabGenerator,
    pub chroot: &'a dyn ChrootConfigurator,
}

impl<'a> Collaborators<'a> {
    pub fn from_tools<T>(tools: &'a T) -> Self
    where
        T: NetworkCheck + PackageInstaller + FstabGenerator + ChrootConfigurator,
    {
        Self {
            network: tools,
            packages: tools,
            fstab: tools,
            chroot: tools,
        }
    }
}

/// systemd-boot loader entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootEntry {
    pub filename: String,
    pub title: String,
    pub linux: String,
    pub initrds: Vec<String>,
    pub options: String,
}

impl BootEntry {
    /// Entry for the installed kernel, root addressed by filesystem UUID.
    pub fn for_root(root_uuid: &str, microcode: Option<&str>) -> Self {
        let mut initrds = Vec::new();
        if let Some(ucode) = microcode {
            initrds.push(format!("/{ucode}.img"));
        }
        initrds.push("/initramfs-linux.img".to_string());

        Self {
            filename: "arch".to_string(),
            title: "Arch Linux".to_string(),
            linux: "/vmlinuz-linux".to_string(),
            initrds,
            options: format!("root=UUID={root_uuid} rootflags=subvol=@ rw"),
        }
    }

    pub fn to_entry_file(&self) -> String {
        let mut out = format!("title   {}\nlinux   {}\n", self.title, self.linux);
        for initrd in &self.initrds {
            out.push_str(&format!("initrd  {initrd}\n"));
        }
        out.push_str(&format!("options {}\n", self.options));
        out
    }
}

pub fn loader_conf(default_entry: &str) -> String {
    format!("default {default_entry}.conf\ntimeout 3\neditor  no\n")
}

/// Line enabling `locale` in /etc/locale.gen.
pub fn locale_gen_line(locale: &str) -> String {
    let charset = match locale.split_once('.') {
        Some((_, charset)) => charset.split('@').next().unwrap_or(charset),
        None => "ISO-8859-1",
    };
    format!("{locale} {charset}\n")
}

pub fn locale_conf(locale: &str) -> String {
    format!("LANG={locale}\n")
}

/// Symlink target for /etc/localtime.
pub fn zoneinfo_path(timezone: &str) -> String {
    format!("/usr/share/zoneinfo/{timezone}")
}

/// Connect to the first reachable address of `endpoint`.
pub fn reach(endpoint: &str, timeout: Duration) -> Result<()> {
    let unreachable = |reason: String| {
        InstallError::Environment(format!("no network: {endpoint} {reason}"))
    };
    let addrs = endpoint
        .to_socket_addrs()
        .map_err(|e| unreachable(format!("does not resolve ({e})")))?;
    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => return Ok(()),
            Err(e) => last_error = Some(e),
        }
    }
    Err(match last_error {
        Some(e) => unreachable(format!("is unreachable ({e})")),
        None => unreachable("resolved to no addresses".to_string()),
    })
}

fn append_file(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| InstallError::io(format!("opening {}", path.display()), e))?;
    file.write_all(content)
        .map_err(|e| InstallError::io(format!("writing {}", path.display()), e))
}

fn replace_symlink(link: &Path, points_to: &str) -> Result<()> {
    match fs::remove_file(link) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(InstallError::io(format!("removing {}", link.display()), e)),
    }
    symlink(points_to, link)
        .map_err(|e| InstallError::io(format!("linking {}", link.display()), e))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| InstallError::io(format!("creating {}", parent.display()), e))?;
    }
    fs::write(path, content).map_err(|e| InstallError::io(format!("writing {}", path.display()), e))
}

/// pacstrap / genfstab / arch-chroot.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchTools;

impl ArchTools {
    fn chroot(root: &Path) -> Cmd {
        Cmd::new("arch-chroot").arg_path(root)
    }
}

impl NetworkCheck for ArchTools {
    fn check(&self) -> Result<()> {
        reach(MIRROR_ENDPOINT, CONNECT_TIMEOUT)
    }
}

impl PackageInstaller for ArchTools {
    fn install(&self, root: &Path, packages: &[String]) -> Result<()> {
        Cmd::new("pacstrap")
            .arg("-K")
            .arg_path(root)
            .args(packages)
            .run_interactive()?;
        Ok(())
    }
}

impl FstabGenerator for ArchTools {
    fn generate(&self, root: &Path) -> Result<()> {
        let result = Cmd::new("genfstab").arg("-U").arg_path(root).run()?;
        append_file(&root.join("etc/fstab"), result.stdout.as_bytes())
    }
}

impl ChrootConfigurator for ArchTools {
    fn configure(&self, root: &Path, root_device: &str, plan: &InstallPlan) -> Result<()> {
        write_file(&root.join("etc/hostname"), &format!("{}\n", plan.hostname))?;

        append_file(&root.join("etc/locale.gen"), locale_gen_line(&plan.locale).as_bytes())?;
        Self::chroot(root).arg("locale-gen").run()?;
        write_file(&root.join("etc/locale.conf"), &locale_conf(&plan.locale))?;
        replace_symlink(&root.join("etc/localtime"), &zoneinfo_path(&plan.timezone))?;
        Self::chroot(root).args(["hwclock", "--systohc"]).run()?;

        Self::chroot(root)
            .args(["useradd", "-m", "-G", "wheel", "-s", "/bin/bash", plan.username.as_str()])
            .run()?;
        let credentials = format!(
            "{user}:{pw}\nroot:{pw}\n",
            user = plan.username,
            pw = plan.password()
        );
        Self::chroot(root).arg("chpasswd").stdin(credentials).run()?;
        write_file(
            &root.join("etc/sudoers.d/10-wheel"),
            "%wheel ALL=(ALL:ALL) ALL\n",
        )?;

        Self::chroot(root).args(["bootctl", "install"]).run()?;
        let uuid = Cmd::new("blkid")
            .args(["-s", "UUID", "-o", "value", root_device])
            .run()?
            .stdout_trimmed()
            .to_string();
        if uuid.is_empty() {
            return Err(InstallError::UnexpectedMountState(format!(
                "blkid reported no filesystem UUID for {root_device}"
            )));
        }

        let entry = BootEntry::for_root(&uuid, plan.microcode_package());
        write_file(
            &root.join(format!("boot/loader/entries/{}.conf", entry.filename)),
            &entry.to_entry_file(),
        )?;
        write_file(&root.join("boot/loader/loader.conf"), &loader_conf(&entry.filename))?;

        let mut services = vec!["NetworkManager"];
        if let Some(desktop) = plan.desktop {
            services.push(desktop.display_manager());
        }
        Self::chroot(root)
            .args(["systemctl", "enable"])
            .args(&services)
            .run()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_entry_with_microcode_lists_it_first() {
        let entry = BootEntry::for_root("1234-abcd", Some("intel-ucode"));
        assert_eq!(
            entry.to_entry_file(),
            "title   Arch Linux\n\
             linux   /vmlinuz-linux\n\
             initrd  /intel-ucode.img\n\
             initrd  /initramfs-linux.img\n\
             options root=UUID=1234-abcd rootflags=subvol=@ rw\n"
        );
    }

    #[test]
    fn boot_entry_without_microcode() {
        let entry = BootEntry::for_root("u", None);
        assert_eq!(entry.initrds, vec!["/initramfs-linux.img".to_string()]);
    }

    #[test]
    fn loader_conf_points_at_entry() {
        assert!(loader_conf("arch").starts_with("default arch.conf\n"));
    }

    #[test]
    fn locale_gen_line_carries_charset() {
        assert_eq!(locale_gen_line("en_US.UTF-8"), "en_US.UTF-8 UTF-8\n");
        assert_eq!(locale_gen_line("de_DE.ISO-8859-15@euro"), "de_DE.ISO-8859-15@euro ISO-8859-15\n");
        assert_eq!(locale_gen_line("en_US"), "en_US ISO-8859-1\n");
        assert_eq!(locale_conf("C.UTF-8"), "LANG=C.UTF-8\n");
    }

    #[test]
    fn localtime_is_relinked() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("localtime");
        replace_symlink(&link, &zoneinfo_path("UTC")).unwrap();
        replace_symlink(&link, &zoneinfo_path("Europe/Berlin")).unwrap();
        assert_eq!(
            fs::read_link(&link).unwrap(),
            Path::new("/usr/share/zoneinfo/Europe/Berlin")
        );
    }

    #[test]
    fn append_keeps_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locale.gen");
        fs::write(&path, "#en_US.UTF-8 UTF-8\n").unwrap();
        append_file(&path, locale_gen_line("en_US.UTF-8").as_bytes()).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "#en_US.UTF-8 UTF-8\nen_US.UTF-8 UTF-8\n"
        );
    }

    #[test]
    fn closed_port_is_reported_as_no_network() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let open = listener.local_addr().unwrap().to_string();
        reach(&open, Duration::from_secs(1)).unwrap();
        drop(listener);

        let err = reach(&open, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, InstallError::Environment(_)));
        assert!(err.to_string().contains("no network"));
    }

    #[test]
    fn write_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boot/loader/entries/arch.conf");
        write_file(&path, "x").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "x");
    }
}
