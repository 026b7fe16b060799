//! Interactive prompts for the operator's choices.
//!
//! Invalid answers are re-prompted; only terminal failures (no TTY, EOF)
//! surface as [`InstallError::Prompt`].

use dialoguer::{Confirm, Input, Password};

use crate::devices::{self, BlockDevice};
use crate::error::{InstallError, Result};
use crate::plan;

fn prompt_error(e: dialoguer::Error) -> InstallError {
    InstallError::Prompt(e.to_string())
}

/// List `candidates` and ask for a 1-based index until a valid one is given.
pub fn choose_device(title: &str, candidates: &[BlockDevice]) -> Result<String> {
    devices::print_candidates(title, candidates);
    loop {
        let answer: String = Input::new()
            .with_prompt(format!("{} [1-{}]", title, candidates.len()))
            .interact_text()
            .map_err(prompt_error)?;
        match devices::select_candidate(candidates, &answer) {
            Ok(device) => return Ok(device.path.clone()),
            Err(e) if e.is_recoverable() => println!("  {e}"),
            Err(e) => return Err(e),
        }
    }
}

fn ask_validated(prompt: &str, validate: fn(&str) -> Result<()>) -> Result<String> {
    Input::<String>::new()
        .with_prompt(prompt)
        .validate_with(|value: &String| validate(value.trim()).map_err(|e| e.to_string()))
        .interact_text()
        .map(|value| value.trim().to_string())
        .map_err(prompt_error)
}

pub fn ask_username() -> Result<String> {
    ask_validated("Username", plan::validate_username)
}

pub fn ask_hostname() -> Result<String> {
    ask_validated("Hostname", plan::validate_hostname)
}

/// Password for the new user (also set for root), entered twice.
pub fn ask_password() -> Result<String> {
    loop {
        let password = Password::new()
            .with_prompt("Password")
            .with_confirmation("Repeat password", "Passwords do not match")
            .interact()
            .map_err(prompt_error)?;
        match plan::validate_password(&password) {
            Ok(()) => return Ok(password),
            Err(e) => println!("  {e}"),
        }
    }
}

/// Last chance before both partitions are wiped.
pub fn confirm_destruction(boot: &str, root: &str) -> Result<bool> {
    println!();
    println!("  {boot} will be formatted as FAT32");
    println!("  {root} will be formatted as btrfs");
    println!("  ALL DATA ON BOTH PARTITIONS WILL BE LOST");
    Confirm::new()
        .with_prompt("Continue?")
        .default(false)
        .interact()
        .map_err(prompt_error)
}
