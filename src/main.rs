//! recinstall - btrfs-on-UEFI Linux installer.
//!
//! Formats a FAT32 boot partition and a btrfs root partition, lays out
//! subvolumes, mounts them under the target, provisions a swapfile and
//! hands off to pacstrap, genfstab and arch-chroot.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::install::InstallArgs;
use recinstall::config::Config;
use recinstall::plan::Desktop;

#[derive(Parser)]
#[command(name = "recinstall")]
#[command(about = "btrfs/UEFI Linux installer")]
#[command(
    after_help = "QUICK START:\n  recinstall preflight  Check the live system\n  recinstall devices    List candidate partitions\n  recinstall install    Install (prompts for anything missing)\n  recinstall teardown   Unmount a half-finished install"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format, mount, and install onto the selected partitions
    Install {
        /// Boot partition (must be FAT32)
        #[arg(long)]
        boot: Option<String>,
        /// Root partition (ext4, btrfs, xfs or f2fs)
        #[arg(long)]
        root: Option<String>,
        /// Login name for the new user
        #[arg(long)]
        username: Option<String>,
        /// Hostname for the new system
        #[arg(long)]
        hostname: Option<String>,
        /// System locale [default: RECINSTALL_LOCALE or en_US.UTF-8]
        #[arg(long)]
        locale: Option<String>,
        /// Zoneinfo name, e.g. Europe/Berlin [default: RECINSTALL_TIMEZONE or UTC]
        #[arg(long)]
        timezone: Option<String>,
        /// Desktop environment to install (gnome, kde, xfce)
        #[arg(long)]
        desktop: Option<Desktop>,
        /// Don't ask before formatting
        #[arg(long)]
        yes: bool,
    },

    /// List boot and root partition candidates
    Devices,

    /// Run preflight checks (root, UEFI, host tools, network)
    Preflight {
        /// Fail on warnings too (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Deactivate the swapfile and unmount everything under the target
    Teardown,

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
    /// Show the subvolume layout and mount options
    Layout,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RECINSTALL_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = Config::load();

    match cli.command {
        Commands::Install {
            boot,
            root,
            username,
            hostname,
            locale,
            timezone,
            desktop,
            yes,
        } => {
            let args = InstallArgs {
                boot,
                root,
                username,
                hostname,
                locale,
                timezone,
                desktop,
                yes,
            };
            commands::cmd_install(args, &config)?;
        }

        Commands::Devices => {
            commands::cmd_devices()?;
        }

        Commands::Preflight { strict } => {
            commands::cmd_preflight(strict)?;
        }

        Commands::Teardown => {
            commands::cmd_teardown(&config)?;
        }

        Commands::Show { what } => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Layout => commands::show::ShowTarget::Layout,
            };
            commands::cmd_show(show_target, &config)?;
        }
    }

    Ok(())
}
