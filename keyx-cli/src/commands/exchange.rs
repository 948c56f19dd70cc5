//! Exchange Commands
//!
//! Open, list, answer and finalize key exchange requests.

use anyhow::Result;
use keyx_core::{KeyExchangeTransport, RequestStatus};
use uuid::Uuid;

use crate::config::CliConfig;
use crate::display;

/// Opens a key exchange with `counterparty`.
pub fn request(config: &CliConfig, counterparty: &str) -> Result<()> {
    let user = config.user()?;
    let manager = config.manager()?;

    let request_id = manager.initiate(user, counterparty)?;

    display::success(&format!("Key exchange requested with {}", counterparty));
    println!();
    println!("  Request ID: {}", request_id);
    println!("  Backend:    {}", manager.backend());
    println!();
    display::info(&format!(
        "Once {} confirms, run: keyx finalize {}",
        counterparty, request_id
    ));

    Ok(())
}

/// Lists every request the user takes part in.
pub fn list(config: &CliConfig) -> Result<()> {
    let user = config.user()?;
    let views = config.transport()?.list_requests()?;

    if views.is_empty() {
        display::info("No key exchange requests. Start one with:");
        println!("  keyx request <user>");
        return Ok(());
    }

    let pending = views
        .iter()
        .filter(|view| view.request.status == RequestStatus::Pending)
        .count();

    println!();
    println!("Key exchange requests ({}, {} pending):", views.len(), pending);
    println!();
    println!("{}", display::requests_table(user, &views));
    println!();

    Ok(())
}

/// Accepts a request addressed to the user.
pub fn confirm(config: &CliConfig, request_id: Uuid) -> Result<()> {
    let user = config.user()?;
    let manager = config.manager()?;

    if manager.respond(request_id, user, true)?.is_some() {
        display::success(&format!("Confirmed request {}", request_id));
        display::info("Shared secret derived and stored");
    }

    Ok(())
}

/// Declines a request addressed to the user.
pub fn decline(config: &CliConfig, request_id: Uuid) -> Result<()> {
    let user = config.user()?;
    let manager = config.manager()?;

    manager.respond(request_id, user, false)?;
    display::success(&format!("Declined request {}", request_id));

    Ok(())
}

/// Derives the shared secret for a request the user opened.
pub fn finalize(config: &CliConfig, request_id: Uuid) -> Result<()> {
    let user = config.user()?;
    let manager = config.manager()?;

    manager.finalize(request_id, user)?;
    display::success(&format!("Key exchange {} finalized", request_id));
    display::info("Shared secret derived and stored");

    Ok(())
}
