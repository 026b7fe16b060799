//! recinstall library exports.
//!
//! The CLI in `main.rs` is a thin layer over these modules; integration
//! tests drive the pipeline through the same API with an in-memory host.

pub mod config;
pub mod devices;
pub mod error;
pub mod external;
pub mod install;
pub mod layout;
pub mod mounts;
pub mod plan;
pub mod preflight;
pub mod process;
pub mod prompt;
pub mod stages;
pub mod system;
pub mod timing;

pub use error::{InstallError, Result, Stage};
