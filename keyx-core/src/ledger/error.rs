// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Ledger error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors returned by exchange request ledgers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("A pending key exchange request already exists for this pair")]
    AlreadyExists,

    #[error("Key exchange request not found: {0}")]
    NotFound(Uuid),

    #[error("Key exchange request {0} is no longer pending")]
    NotPending(Uuid),

    #[error("Confirming a key exchange request requires a public key")]
    MissingPublicKey,

    #[error("Cannot request a key exchange with yourself")]
    SelfExchange,

    #[error("Ledger storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}
