//! Configuration management for recinstall.
//!
//! Reads configuration from environment variables. `main` loads a `.env`
//! file first (via dotenvy), so values there act as defaults that real
//! environment variables override.

use std::collections::HashMap;
use std::path::{Component, PathBuf};
use std::time::Duration;

use crate::error::{InstallError, Result};

pub const DEFAULT_TARGET: &str = "/mnt";
pub const DEFAULT_SCRATCH: &str = "/run/recinstall/top";
pub const DEFAULT_SETTLE_MS: u64 = 2000;
pub const DEFAULT_LOCALE: &str = "en_US.UTF-8";
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// recinstall configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where the new system is mounted (RECINSTALL_TARGET)
    pub target: PathBuf,
    /// Top-level btrfs mount used while creating subvolumes (RECINSTALL_SCRATCH)
    pub scratch: PathBuf,
    /// Pause between unmounting and the busy check (RECINSTALL_SETTLE_MS)
    pub settle_delay: Duration,
    /// Extra packages appended to the base set (RECINSTALL_EXTRA_PACKAGES)
    pub extra_packages: Vec<String>,
    /// Default system locale when `--locale` is not given (RECINSTALL_LOCALE)
    pub locale: String,
    /// Default zoneinfo name when `--timezone` is not given (RECINSTALL_TIMEZONE)
    pub timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: PathBuf::from(DEFAULT_TARGET),
            scratch: PathBuf::from(DEFAULT_SCRATCH),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
            extra_packages: Vec::new(),
            locale: DEFAULT_LOCALE.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build configuration from key/value pairs, falling back to defaults.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let defaults = Self::default();

        let path_var = |key: &str, default: PathBuf| {
            vars.get(key)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or(default)
        };

        let string_var = |key: &str, default: String| {
            vars.get(key)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or(default)
        };

        let target = path_var("RECINSTALL_TARGET", defaults.target);
        let scratch = path_var("RECINSTALL_SCRATCH", defaults.scratch);

        let settle_delay = match vars.get("RECINSTALL_SETTLE_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) => Duration::from_millis(ms),
                Err(_) => {
                    tracing::warn!(
                        value = %raw,
                        "RECINSTALL_SETTLE_MS is not a number, using {}ms",
                        DEFAULT_SETTLE_MS
                    );
                    defaults.settle_delay
                }
            },
            None => defaults.settle_delay,
        };

        let extra_packages = vars
            .get("RECINSTALL_EXTRA_PACKAGES")
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Self {
            target,
            scratch,
            settle_delay,
            extra_packages,
            locale: string_var("RECINSTALL_LOCALE", defaults.locale),
            timezone: string_var("RECINSTALL_TIMEZONE", defaults.timezone),
        }
    }

    /// The scratch mount must not sit inside the target tree, or the
    /// reconciler would tear it down mid-stage.
    pub fn scratch_is_outside_target(&self) -> bool {
        !self.scratch.starts_with(&self.target)
    }

    /// The target must be an absolute, normalized path below `/`. Teardown
    /// unmounts everything under it, so `/` would take the host down with it.
    pub fn validate_target(&self) -> Result<()> {
        let invalid = |reason: &str| InstallError::InvalidInput {
            field: "RECINSTALL_TARGET",
            reason: format!("{} (got '{}')", reason, self.target.display()),
        };
        if !self.target.is_absolute() {
            return Err(invalid("must be an absolute path"));
        }
        if self.target.components().any(|c| c == Component::ParentDir) {
            return Err(invalid("must not contain '..'"));
        }
        if self.target.parent().is_none() {
            return Err(invalid("must not be the filesystem root"));
        }
        Ok(())
    }

    /// Everything an install run relies on: a valid target and an absolute
    /// scratch path outside it.
    pub fn validate(&self) -> Result<()> {
        self.validate_target()?;
        let invalid = |reason: String| InstallError::InvalidInput {
            field: "RECINSTALL_SCRATCH",
            reason,
        };
        if !self.scratch.is_absolute() {
            return Err(invalid(format!(
                "must be an absolute path (got '{}')",
                self.scratch.display()
            )));
        }
        if !self.scratch_is_outside_target() {
            return Err(invalid(format!(
                "{} lies inside the target {}",
                self.scratch.display(),
                self.target.display()
            )));
        }
        Ok(())
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  RECINSTALL_TARGET: {}", self.target.display());
        println!("  RECINSTALL_SCRATCH: {}", self.scratch.display());
        println!("  RECINSTALL_SETTLE_MS: {}", self.settle_delay.as_millis());
        if self.extra_packages.is_empty() {
            println!("  RECINSTALL_EXTRA_PACKAGES: (none)");
        } else {
            println!("  RECINSTALL_EXTRA_PACKAGES: {}", self.extra_packages.join(" "));
        }
        println!("  RECINSTALL_LOCALE: {}", self.locale);
        println!("  RECINSTALL_TIMEZONE: {}", self.timezone);
        if let Err(e) = self.validate() {
            println!("  WARNING: {e}");
        }
    }
}
