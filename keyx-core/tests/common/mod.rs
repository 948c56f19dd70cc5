// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Common Test Utilities
//!
//! Shared fixtures for integration tests: a shared ledger and registry,
//! and parties that talk to them through in-process transports.

#![allow(dead_code)]

pub mod strategies;

use std::sync::Arc;

use keyx_core::{
    BackendKind, DhParameters, KeyExchangeManager, Ledger, LocalTransport,
    MemoryKeyMaterialStore, MemoryLedger, MemoryParameterRegistry, ParameterRegistry,
};

pub type Party = KeyExchangeManager<LocalTransport, MemoryKeyMaterialStore>;

/// Ledger and registry every party in a test talks to.
pub struct Network {
    pub ledger: Arc<dyn Ledger>,
    pub registry: Arc<dyn ParameterRegistry>,
}

impl Network {
    pub fn new() -> Self {
        Network {
            ledger: Arc::new(MemoryLedger::new()),
            registry: Arc::new(MemoryParameterRegistry::new()),
        }
    }

    /// A network with the built-in 2048-bit group already published.
    pub fn with_parameters() -> Self {
        let network = Self::new();
        network
            .registry
            .submit_parameters(DhParameters::rfc3526_modp_2048().to_pem().unwrap().as_bytes())
            .unwrap();
        network
    }

    pub fn transport(&self, identity: &str) -> LocalTransport {
        LocalTransport::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.registry),
            identity,
        )
    }

    pub fn party(&self, identity: &str, backend: BackendKind) -> Party {
        KeyExchangeManager::new(
            self.transport(identity),
            MemoryKeyMaterialStore::new(),
            backend,
        )
    }
}
