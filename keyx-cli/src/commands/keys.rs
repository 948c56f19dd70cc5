//! Keys Command
//!
//! Shows local key material.

use anyhow::Result;

use crate::config::CliConfig;
use crate::display;

/// Lists our public key for each counterparty.
pub fn public_keys(config: &CliConfig) -> Result<()> {
    let user = config.user()?;
    let manager = config.manager()?;
    let keys = manager.public_keys(user)?;

    if keys.is_empty() {
        display::info(&format!("No key material for {}", user));
        return Ok(());
    }

    println!();
    println!("Public keys of {} ({}):", user, keys.len());
    println!();
    println!("{}", display::public_keys_table(&keys));
    println!();

    Ok(())
}
