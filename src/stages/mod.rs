//! Pipeline stages, leaves first.
//!
//! Each stage takes the capabilities it needs plus the [`InstallPlan`] and
//! either establishes its postcondition or returns an error. Ordering and
//! cleanup are the job of [`crate::install`].
//!
//! [`InstallPlan`]: crate::plan::InstallPlan

pub mod discovery;
pub mod format;
pub mod guard;
pub mod layout;
pub mod reconcile;
pub mod subvolumes;
pub mod swap;
