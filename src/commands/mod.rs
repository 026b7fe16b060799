//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `install` - Run the full install pipeline
//! - `devices` - List boot and root candidates
//! - `preflight` - Run preflight checks
//! - `teardown` - Release a half-finished install
//! - `show` - Display information

mod devices;
pub mod install;
mod preflight;
pub mod show;
mod teardown;

pub use devices::cmd_devices;
pub use install::cmd_install;
pub use preflight::cmd_preflight;
pub use show::cmd_show;
pub use teardown::cmd_teardown;
