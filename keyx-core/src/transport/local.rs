// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! In-process transport.

use std::sync::Arc;

use uuid::Uuid;

use super::{KeyExchangeTransport, TransportResult};
use crate::agreement::BackendKind;
use crate::ledger::{ExchangeRequestView, Ledger};
use crate::registry::ParameterRegistry;

/// Calls a ledger and registry directly, as a fixed identity.
///
/// Several transports may share one ledger to simulate several parties.
#[derive(Clone)]
pub struct LocalTransport {
    ledger: Arc<dyn Ledger>,
    registry: Arc<dyn ParameterRegistry>,
    identity: String,
}

impl LocalTransport {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        registry: Arc<dyn ParameterRegistry>,
        identity: impl Into<String>,
    ) -> Self {
        LocalTransport {
            ledger,
            registry,
            identity: identity.into(),
        }
    }

    /// Same backing stores, acting as someone else.
    pub fn with_identity(&self, identity: impl Into<String>) -> Self {
        LocalTransport {
            ledger: Arc::clone(&self.ledger),
            registry: Arc::clone(&self.registry),
            identity: identity.into(),
        }
    }
}

impl KeyExchangeTransport for LocalTransport {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn fetch_parameters(&self) -> TransportResult<Vec<u8>> {
        Ok(self.registry.latest_parameters()?.parameters)
    }

    fn upload_parameters(&self, parameters: &[u8]) -> TransportResult<()> {
        self.registry.submit_parameters(parameters)?;
        Ok(())
    }

    fn list_requests(&self) -> TransportResult<Vec<ExchangeRequestView>> {
        Ok(self.ledger.list_for(&self.identity)?)
    }

    fn create_request(
        &self,
        counterparty_id: &str,
        public_key: &str,
        backend: BackendKind,
    ) -> TransportResult<Uuid> {
        Ok(self
            .ledger
            .create(&self.identity, counterparty_id, public_key, backend)?)
    }

    fn confirm_or_decline(
        &self,
        request_id: Uuid,
        confirmed: bool,
        public_key: Option<&str>,
    ) -> TransportResult<()> {
        self.ledger
            .confirm_or_decline(request_id, &self.identity, confirmed, public_key)?;
        Ok(())
    }
}
