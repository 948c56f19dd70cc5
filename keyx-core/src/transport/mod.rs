// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Transport
//!
//! How a client reaches the ledger and the parameter registry: in-process
//! for tests and single-host setups, or over HTTP to a key exchange server.
//! A transport is bound to the identity it acts as.

#[cfg(feature = "http")]
mod http;
mod local;

#[cfg(feature = "http")]
pub use http::{HttpTransport, HttpTransportConfig};
pub use local::LocalTransport;

use thiserror::Error;
use uuid::Uuid;

use crate::agreement::BackendKind;
use crate::ledger::{ExchangeRequestView, LedgerError};
use crate::registry::RegistryError;

/// Transport error types.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Operations a client needs from the key exchange service.
pub trait KeyExchangeTransport {
    /// Identity every call is made as.
    fn identity(&self) -> &str;

    /// Latest parameter set, as uploaded.
    fn fetch_parameters(&self) -> TransportResult<Vec<u8>>;

    /// Publishes a parameter set.
    fn upload_parameters(&self, parameters: &[u8]) -> TransportResult<()>;

    /// Every request the identity takes part in.
    fn list_requests(&self) -> TransportResult<Vec<ExchangeRequestView>>;

    /// Opens a request to `counterparty_id` carrying our public key.
    fn create_request(
        &self,
        counterparty_id: &str,
        public_key: &str,
        backend: BackendKind,
    ) -> TransportResult<Uuid>;

    /// Answers a request addressed to us.
    fn confirm_or_decline(
        &self,
        request_id: Uuid,
        confirmed: bool,
        public_key: Option<&str>,
    ) -> TransportResult<()>;
}
