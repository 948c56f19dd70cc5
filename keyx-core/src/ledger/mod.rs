// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Exchange Request Ledger
//!
//! Authoritative state machine for pairwise key exchange negotiation:
//! `Pending -> {Confirmed, Declined}`, both terminal. At most one pending
//! request may exist per unordered pair of identities. Requests are never
//! deleted.

mod error;
mod memory;
mod sqlite;

pub use error::LedgerError;
pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agreement::BackendKind;
use crate::unix_millis;

/// Negotiation state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Confirmed,
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Confirmed => "confirmed",
            RequestStatus::Declined => "declined",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "confirmed" => Ok(RequestStatus::Confirmed),
            "declined" => Ok(RequestStatus::Declined),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

/// The viewing identity's relationship to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Sender,
    Receiver,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Sender => f.write_str("sender"),
            Actor::Receiver => f.write_str("receiver"),
        }
    }
}

/// One pairwise negotiation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    /// Key agreement variant both public keys belong to.
    pub backend: BackendKind,
    /// Base64 public key of the initiator.
    pub sender_public_key: String,
    /// Base64 public key of the counterparty; set iff confirmed.
    pub receiver_public_key: Option<String>,
    pub status: RequestStatus,
    /// Unix timestamp in milliseconds.
    pub created_at: u64,
}

impl ExchangeRequest {
    /// Creates a new pending request.
    pub fn new(
        sender_id: &str,
        receiver_id: &str,
        sender_public_key: &str,
        backend: BackendKind,
    ) -> Self {
        ExchangeRequest {
            id: Uuid::new_v4(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            backend,
            sender_public_key: sender_public_key.to_string(),
            receiver_public_key: None,
            status: RequestStatus::Pending,
            created_at: unix_millis(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Role of `identity` in this request, if it takes part at all.
    pub fn actor_for(&self, identity: &str) -> Option<Actor> {
        if self.sender_id == identity {
            Some(Actor::Sender)
        } else if self.receiver_id == identity {
            Some(Actor::Receiver)
        } else {
            None
        }
    }

    /// The other party from `identity`'s point of view.
    pub fn counterparty_of(&self, identity: &str) -> &str {
        if self.sender_id == identity {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }

    /// True if this request is between `a` and `b`, in either direction.
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }

    /// Applies the counterparty's answer. Callers check preconditions first.
    pub(crate) fn resolve(&mut self, confirmed: bool, receiver_public_key: Option<&str>) {
        if confirmed {
            self.status = RequestStatus::Confirmed;
            self.receiver_public_key = receiver_public_key.map(str::to_string);
        } else {
            self.status = RequestStatus::Declined;
            self.receiver_public_key = None;
        }
    }
}

/// A request as seen by one of its participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequestView {
    pub actor: Actor,
    pub request: ExchangeRequest,
}

/// Ledger of key exchange requests.
///
/// Each operation is atomic: concurrent `create` calls for one pair yield
/// exactly one success, and concurrent answers to one request yield
/// exactly one success.
pub trait Ledger: Send + Sync {
    /// Opens a pending request from `sender_id` to `receiver_id`.
    ///
    /// `backend` records which key agreement variant the sender's key
    /// belongs to; the receiver must answer with a key of the same kind.
    fn create(
        &self,
        sender_id: &str,
        receiver_id: &str,
        sender_public_key: &str,
        backend: BackendKind,
    ) -> Result<Uuid, LedgerError>;

    /// All requests `identity` takes part in, in creation order.
    fn list_for(&self, identity: &str) -> Result<Vec<ExchangeRequestView>, LedgerError>;

    /// Looks up a single request.
    fn get(&self, request_id: Uuid) -> Result<Option<ExchangeRequest>, LedgerError>;

    /// Confirms (with the receiver's public key) or declines a pending request.
    ///
    /// Only the receiver may answer; for anyone else the request is
    /// reported as not found. Not idempotent: a retry after a successful
    /// answer fails with `NotPending`.
    fn confirm_or_decline(
        &self,
        request_id: Uuid,
        acting_identity: &str,
        confirmed: bool,
        receiver_public_key: Option<&str>,
    ) -> Result<(), LedgerError>;
}

/// Orders a pair so `(a, b)` and `(b, a)` compare equal.
pub(crate) fn normalized_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

pub(crate) fn check_create(
    sender_id: &str,
    receiver_id: &str,
    sender_public_key: &str,
) -> Result<(), LedgerError> {
    if sender_id == receiver_id {
        return Err(LedgerError::SelfExchange);
    }
    if sender_public_key.is_empty() {
        return Err(LedgerError::MissingPublicKey);
    }
    Ok(())
}

pub(crate) fn check_answer(
    request: &ExchangeRequest,
    acting_identity: &str,
    confirmed: bool,
    receiver_public_key: Option<&str>,
) -> Result<(), LedgerError> {
    if request.receiver_id != acting_identity {
        return Err(LedgerError::NotFound(request.id));
    }
    if !request.is_pending() {
        return Err(LedgerError::NotPending(request.id));
    }
    if confirmed && receiver_public_key.map_or(true, str::is_empty) {
        return Err(LedgerError::MissingPublicKey);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_for() {
        let request = ExchangeRequest::new("alice", "bob", "a2V5", BackendKind::Ecdh);
        assert_eq!(request.actor_for("alice"), Some(Actor::Sender));
        assert_eq!(request.actor_for("bob"), Some(Actor::Receiver));
        assert_eq!(request.actor_for("carol"), None);
    }

    #[test]
    fn test_is_between_is_unordered() {
        let request = ExchangeRequest::new("alice", "bob", "a2V5", BackendKind::Ecdh);
        assert!(request.is_between("alice", "bob"));
        assert!(request.is_between("bob", "alice"));
        assert!(!request.is_between("alice", "carol"));
    }

    #[test]
    fn test_resolve_decline_drops_key() {
        let mut request = ExchangeRequest::new("alice", "bob", "a2V5", BackendKind::Ecdh);
        request.resolve(false, Some("ignored"));
        assert_eq!(request.status, RequestStatus::Declined);
        assert_eq!(request.receiver_public_key, None);
    }

    #[test]
    fn test_check_answer_order() {
        let mut request = ExchangeRequest::new("alice", "bob", "a2V5", BackendKind::Ecdh);

        assert_eq!(
            check_answer(&request, "alice", true, Some("k")),
            Err(LedgerError::NotFound(request.id))
        );
        assert_eq!(
            check_answer(&request, "bob", true, None),
            Err(LedgerError::MissingPublicKey)
        );
        assert_eq!(
            check_answer(&request, "bob", true, Some("")),
            Err(LedgerError::MissingPublicKey)
        );
        assert_eq!(check_answer(&request, "bob", false, None), Ok(()));

        request.resolve(false, None);
        assert_eq!(
            check_answer(&request, "bob", false, None),
            Err(LedgerError::NotPending(request.id))
        );
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Confirmed,
            RequestStatus::Declined,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>().unwrap(), status);
        }
        assert!("deleted".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_normalized_pair() {
        assert_eq!(normalized_pair("bob", "alice"), ("alice", "bob"));
        assert_eq!(normalized_pair("alice", "bob"), ("alice", "bob"));
    }
}
