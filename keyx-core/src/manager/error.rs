// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Manager error types.

use thiserror::Error;
use uuid::Uuid;

use crate::agreement::{AgreementError, BackendKind};
use crate::ledger::{LedgerError, RequestStatus};
use crate::storage::StorageError;
use crate::transport::TransportError;

/// Errors from local key exchange orchestration.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error(transparent)]
    Agreement(#[from] AgreementError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Key exchange request {request_id} is {status}, not confirmed")]
    NotConfirmed {
        request_id: Uuid,
        status: RequestStatus,
    },

    #[error("No key material stored for {0}")]
    MissingKeyMaterial(String),

    #[error("Stored key material for {0} does not match the request; it was re-initiated")]
    StaleKeyMaterial(String),

    #[error("Key exchange request {request_id} uses {requested}, but this party is configured for {configured}")]
    BackendMismatch {
        request_id: Uuid,
        requested: BackendKind,
        configured: BackendKind,
    },

    #[error("Transport acts as {transport}, but the operation was requested for {requested}")]
    IdentityMismatch { transport: String, requested: String },
}

impl From<LedgerError> for ManagerError {
    fn from(e: LedgerError) -> Self {
        ManagerError::Transport(TransportError::Ledger(e))
    }
}

impl ManagerError {
    /// The ledger error underneath, if any.
    pub fn ledger_error(&self) -> Option<&LedgerError> {
        match self {
            ManagerError::Transport(TransportError::Ledger(e)) => Some(e),
            _ => None,
        }
    }
}
