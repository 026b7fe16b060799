//! Error taxonomy for the installer.
//!
//! Every stage returns [`InstallError`]. The pipeline wraps failures with the
//! [`Stage`] that produced them so the operator sees which step aborted.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Guard,
    Discovery,
    Network,
    Reconcile,
    Format,
    Subvolumes,
    Layout,
    Swap,
    Packages,
    Fstab,
    Chroot,
    Teardown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Guard => "privilege/environment guard",
            Stage::Discovery => "device discovery",
            Stage::Network => "network check",
            Stage::Reconcile => "mount-state reconciliation",
            Stage::Format => "formatting",
            Stage::Subvolumes => "subvolume creation",
            Stage::Layout => "layout mounting",
            Stage::Swap => "swapfile provisioning",
            Stage::Packages => "package installation",
            Stage::Fstab => "fstab generation",
            Stage::Chroot => "chroot configuration",
            Stage::Teardown => "teardown",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("must run as root (effective uid is {euid})")]
    Privilege { euid: u32 },

    #[error("unsupported environment: {0}")]
    Environment(String),

    #[error("no {kind} partition found: {hint}")]
    NoCandidateFound {
        kind: &'static str,
        hint: &'static str,
    },

    #[error("invalid selection '{input}': enter a number between 1 and {max}")]
    InvalidSelection { input: String, max: usize },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("{device} is still mounted at {}; refusing to format", .mountpoint.display())]
    DeviceBusy { device: String, mountpoint: PathBuf },

    #[error("unexpected mount state: {0}")]
    UnexpectedMountState(String),

    #[error("'{command}' failed (exit code {code}){}", stderr_suffix(.stderr))]
    ToolFailure {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("interrupted by signal")]
    Interrupted,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{stage} failed")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<InstallError>,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(":\n{stderr}")
    }
}

pub type Result<T> = std::result::Result<T, InstallError>;

impl InstallError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        InstallError::Io {
            context: context.into(),
            source,
        }
    }

    /// Attach the failing stage. Errors that already carry a stage keep it.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ InstallError::Stage { .. } => already,
            other => InstallError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error was raised in, if known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            InstallError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying error with any stage wrapper removed.
    pub fn root_cause(&self) -> &InstallError {
        match self {
            InstallError::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Recoverable errors are re-prompted instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.root_cause(),
            InstallError::InvalidSelection { .. } | InstallError::InvalidInput { .. }
        )
    }
}

/// Stage tagging for `Result`s flowing out of a pipeline step.
pub trait StageContext<T> {
    fn stage(self, stage: Stage) -> Result<T>;
}

impl<T> StageContext<T> for Result<T> {
    fn stage(self, stage: Stage) -> Result<T> {
        self.map_err(|e| e.in_stage(stage))
    }
}
