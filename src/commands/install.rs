//! Install command - resolves the plan and runs the pipeline.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use recinstall::config::Config;
use recinstall::external::{ArchTools, Collaborators};
use recinstall::install::{InstallReport, Installer};
use recinstall::plan::{Desktop, InstallPlan, PlanInput};
use recinstall::prompt;
use recinstall::stages::{discovery, guard};
use recinstall::system::{Host, LinuxSystem};
use recinstall::timing::Timer;

/// Values given on the command line; anything missing is prompted.
#[derive(Debug, Default)]
pub struct InstallArgs {
    pub boot: Option<String>,
    pub root: Option<String>,
    pub username: Option<String>,
    pub hostname: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    pub desktop: Option<Desktop>,
    /// Skip the destructive-action confirmation.
    pub yes: bool,
}

/// Set by SIGINT/SIGTERM/SIGHUP once the pipeline is running.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Route termination signals into [`INTERRUPTED`] so the pipeline can stop
/// between stages and unwind through its teardown guard. A second signal
/// exits immediately; `recinstall teardown` cleans up after that.
fn install_signal_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        if INTERRUPTED.swap(true, Ordering::SeqCst) {
            eprintln!("\nSecond interrupt, exiting without cleanup. Run `recinstall teardown`.");
            std::process::exit(130);
        }
        eprintln!("\nInterrupted. Stopping after the current step and unmounting...");
    })
    .context("installing signal handler")
}

/// Execute the install command.
pub fn cmd_install(args: InstallArgs, config: &Config) -> Result<()> {
    let system = LinuxSystem::new();
    let tools = ArchTools;
    let host = Host::from_system(&system);

    // Fail before asking the operator anything.
    config.validate()?;
    guard::check(host.probe)?;
    let candidates = discovery::discover(host.probe)?;

    let boot_device = match args.boot {
        Some(device) => device,
        None => prompt::choose_device("Boot partition", &candidates.boot)?,
    };
    let root_device = match args.root {
        Some(device) => device,
        None => prompt::choose_device("Root partition", &candidates.root)?,
    };
    let username = match args.username {
        Some(name) => name,
        None => prompt::ask_username()?,
    };
    let hostname = match args.hostname {
        Some(name) => name,
        None => prompt::ask_hostname()?,
    };
    let password = prompt::ask_password()?;

    let plan = InstallPlan::new(PlanInput {
        boot_device,
        root_device,
        username,
        password,
        hostname,
        cpu_vendor: host.probe.cpu_vendor()?,
        mem_total_kib: host.probe.mem_total_kib()?,
        locale: args.locale.unwrap_or_else(|| config.locale.clone()),
        timezone: args.timezone.unwrap_or_else(|| config.timezone.clone()),
        desktop: args.desktop,
        extra_packages: config.extra_packages.clone(),
    })?;
    tracing::debug!(?plan, "resolved install plan");

    if !args.yes && !prompt::confirm_destruction(&plan.boot_device, &plan.root_device)? {
        println!("Aborted. Nothing was changed.");
        return Ok(());
    }

    install_signal_handler()?;
    let timer = Timer::start("Install");
    let installer = Installer::new(host, Collaborators::from_tools(&tools), config)
        .with_interrupt(&INTERRUPTED);
    let report = installer.run(&plan)?;
    print_summary(&report);
    timer.finish();
    Ok(())
}

fn print_summary(report: &InstallReport) {
    println!("\n=== Install complete ===");
    println!("Mounted during install:");
    for record in report.mount_tree.iter() {
        println!(
            "  {:<24} {:<12} {}",
            record.target.display(),
            record.source,
            record.options
        );
    }
    println!(
        "Swapfile: {} ({} GiB)",
        report.swapfile.path.display(),
        report.swapfile.size_gib
    );
    for warning in report.reconciled.warnings.iter().chain(&report.teardown.warnings) {
        println!("  [WARN] {warning}");
    }
}
