//! The install pipeline.
//!
//! Guard → discovery → network → reconcile → format → subvolumes → layout → swap →
//! packages → fstab → chroot → teardown. Each stage is a hard precondition
//! for the next. Once the target mountpoint has been claimed, a
//! [`TeardownGuard`] makes sure it is released on every exit path.
//!
//! Signals do not unwind, so the binary installs a handler that only sets a
//! flag. The pipeline checks it between stages and returns
//! [`InstallError::Interrupted`], which drops the guard like any other error.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::Config;
use crate::devices::Candidates;
use crate::error::{InstallError, Result, Stage, StageContext};
use crate::external::Collaborators;
use crate::layout;
use crate::mounts::MountTree;
use crate::plan::InstallPlan;
use crate::stages::reconcile::{self, ReconcileReport};
use crate::stages::swap::SwapFile;
use crate::stages::{discovery, format, guard, layout as layout_stage, subvolumes, swap};
use crate::system::{Host, MountController, SwapController};
use crate::timing::Timer;

/// Best-effort release of the target tree, run when dropped while armed.
pub struct TeardownGuard<'a> {
    mounts: &'a dyn MountController,
    swap: &'a dyn SwapController,
    target: PathBuf,
    scratch: Option<PathBuf>,
    swapfile: Option<PathBuf>,
    armed: bool,
}

impl<'a> TeardownGuard<'a> {
    pub fn arm(host: &Host<'a>, target: &Path) -> Self {
        Self {
            mounts: host.mounts,
            swap: host.swap,
            target: target.to_path_buf(),
            scratch: None,
            swapfile: None,
            armed: true,
        }
    }

    /// Also release the top-level scratch mount, which lives outside the target.
    pub fn track_scratch(&mut self, path: PathBuf) {
        self.scratch = Some(path);
    }

    /// Deactivate this swapfile before unmounting.
    pub fn track_swapfile(&mut self, path: PathBuf) {
        self.swapfile = Some(path);
    }

    /// Tear down now and disarm.
    pub fn finish(mut self) -> ReconcileReport {
        self.armed = false;
        self.release()
    }

    fn release(&self) -> ReconcileReport {
        let mut report = reconcile::teardown(
            self.mounts,
            self.swap,
            &self.target,
            self.swapfile.as_deref(),
        );
        if let Some(scratch) = &self.scratch {
            let released = reconcile::unmount_tree(self.mounts, scratch);
            report.unmounted.extend(released.unmounted);
            report.warnings.extend(released.warnings);
        }
        report
    }
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        eprintln!("Cleaning up: unmounting {}", self.target.display());
        let report = self.release();
        for warning in &report.warnings {
            eprintln!("  [WARN] {warning}");
        }
    }
}

/// What a successful run produced.
#[derive(Debug)]
pub struct InstallReport {
    pub candidates: Candidates,
    pub reconciled: ReconcileReport,
    pub subvolumes: Vec<&'static str>,
    /// The mount tree as observed right after layout mounting.
    pub mount_tree: MountTree,
    pub swapfile: SwapFile,
    pub teardown: ReconcileReport,
}

pub struct Installer<'a> {
    host: Host<'a>,
    external: Collaborators<'a>,
    config: &'a Config,
    interrupted: Option<&'a AtomicBool>,
}

impl<'a> Installer<'a> {
    pub fn new(host: Host<'a>, external: Collaborators<'a>, config: &'a Config) -> Self {
        Self {
            host,
            external,
            config,
            interrupted: None,
        }
    }

    /// Stop before the next stage once `flag` is set.
    pub fn with_interrupt(mut self, flag: &'a AtomicBool) -> Self {
        self.interrupted = Some(flag);
        self
    }

    fn interrupted(&self) -> bool {
        self.interrupted
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn stage<T>(&self, stage: Stage, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if stage != Stage::Teardown && self.interrupted() {
            tracing::warn!(%stage, "interrupted, not starting stage");
            return Err(InstallError::Interrupted.in_stage(stage));
        }
        println!("\n{}...", stage);
        let timer = Timer::start(stage);
        let result = f().stage(stage);
        if result.is_ok() {
            timer.finish();
        }
        result
    }

    pub fn run(&self, plan: &InstallPlan) -> Result<InstallReport> {
        let target = self.config.target.as_path();
        let host = &self.host;
        println!("=== Installing to {} ===", target.display());

        self.stage(Stage::Guard, || {
            self.config.validate()?;
            guard::check(host.probe)
        })?;

        let candidates = self.stage(Stage::Discovery, || {
            discovery::verify_selection(host.probe, plan)
        })?;

        self.stage(Stage::Network, || self.external.network.check())?;

        let reconciled = self.stage(Stage::Reconcile, || {
            let mut report = reconcile::reconcile(host.mounts, host.swap, target);
            let scratch = reconcile::unmount_tree(host.mounts, &self.config.scratch);
            report.unmounted.extend(scratch.unmounted);
            report.warnings.extend(scratch.warnings);
            Ok(report)
        })?;

        let mut cleanup = TeardownGuard::arm(host, target);
        cleanup.track_scratch(self.config.scratch.clone());

        self.stage(Stage::Format, || {
            format::format(host, plan, self.config.settle_delay)
        })?;

        let subvolumes = self.stage(Stage::Subvolumes, || {
            subvolumes::provision(
                host.mounts,
                host.formatter,
                &plan.root_device,
                &self.config.scratch,
            )
        })?;

        let mount_tree = self.stage(Stage::Layout, || {
            layout_stage::mount_layout(host.mounts, plan, target)
        })?;

        cleanup.track_swapfile(layout::swapfile_path(target));
        let swapfile = self.stage(Stage::Swap, || {
            swap::provision(host.swap, target, plan.mem_total_kib)
        })?;

        self.stage(Stage::Packages, || {
            self.external.packages.install(target, &plan.packages())
        })?;
        self.stage(Stage::Fstab, || self.external.fstab.generate(target))?;
        self.stage(Stage::Chroot, || {
            self.external
                .chroot
                .configure(target, &plan.root_device, plan)
        })?;

        let teardown = self.stage(Stage::Teardown, || Ok(cleanup.finish()))?;

        Ok(InstallReport {
            candidates,
            reconciled,
            subvolumes,
            mount_tree,
            swapfile,
            teardown,
        })
    }
}
