//! Display Helpers
//!
//! Terminal output formatting and styling.

use console::style;
use keyx_core::{ExchangeRequestView, PublicKey, RequestStatus};
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Prints a success message.
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Prints an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Prints a warning message.
pub fn warning(msg: &str) {
    println!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Prints an info message.
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

#[derive(Tabled)]
struct RequestRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Counterparty")]
    counterparty: String,
    #[tabled(rename = "Backend")]
    backend: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Tabled)]
struct PublicKeyRow {
    #[tabled(rename = "Counterparty")]
    counterparty: String,
    #[tabled(rename = "Fingerprint")]
    fingerprint: String,
}

fn status_label(status: RequestStatus) -> String {
    match status {
        RequestStatus::Pending => style("pending").yellow().to_string(),
        RequestStatus::Confirmed => style("confirmed").green().to_string(),
        RequestStatus::Declined => style("declined").red().to_string(),
    }
}

/// Renders requests as a table, as seen by `user`.
pub fn requests_table(user: &str, views: &[ExchangeRequestView]) -> String {
    let rows = views.iter().map(|view| RequestRow {
        id: view.request.id.to_string(),
        role: view.actor.to_string(),
        counterparty: view.request.counterparty_of(user).to_string(),
        backend: view.request.backend.to_string(),
        status: status_label(view.request.status),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Renders local public keys with their fingerprints.
pub fn public_keys_table(keys: &[(String, PublicKey)]) -> String {
    let rows = keys.iter().map(|(counterparty, key)| PublicKeyRow {
        counterparty: counterparty.clone(),
        fingerprint: key.fingerprint(),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyx_core::{Actor, BackendKind, ExchangeRequest};

    #[test]
    fn test_requests_table_shows_counterparty() {
        let request = ExchangeRequest::new("alice", "bob", "QUFB", BackendKind::Classical);
        let id = request.id.to_string();
        let views = vec![ExchangeRequestView {
            actor: Actor::Receiver,
            request,
        }];

        let table = requests_table("bob", &views);
        assert!(table.contains(&id));
        assert!(table.contains("receiver"));
        assert!(table.contains("alice"));
        assert!(table.contains("classical"));
    }

    #[test]
    fn test_public_keys_table_shows_fingerprint() {
        let key = PublicKey::from_bytes(vec![1u8; 32]);
        let fingerprint = key.fingerprint();
        let table = public_keys_table(&[("carol".to_string(), key)]);
        assert!(table.contains("carol"));
        assert!(table.contains(&fingerprint));
    }
}
