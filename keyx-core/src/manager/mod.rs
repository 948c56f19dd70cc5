// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Local Secret Material Manager
//!
//! Drives one party's side of a pairwise exchange:
//!
//! 1. Initiator: `initiate` generates a key pair, stores it, and opens a
//!    request carrying the public key.
//! 2. Counterparty: `respond` either declines, or generates its own pair,
//!    derives the secret from the initiator's key, stores everything and
//!    confirms with its public key.
//! 3. Initiator: `finalize` derives the same secret from the counterparty's
//!    key once the request is confirmed.

mod error;

pub use error::ManagerError;

use tracing::{debug, info};
use uuid::Uuid;

use crate::agreement::{
    Backend, BackendKind, DhParameters, KeyAgreement, PublicKey, SharedSecret,
};
use crate::ledger::{Actor, ExchangeRequest, LedgerError, RequestStatus};
use crate::storage::{KeyMaterialRecord, KeyMaterialStore, MaterialKey};
use crate::transport::KeyExchangeTransport;

/// One party's key exchange driver.
pub struct KeyExchangeManager<T: KeyExchangeTransport, S: KeyMaterialStore> {
    transport: T,
    store: S,
    backend: BackendKind,
}

impl<T: KeyExchangeTransport, S: KeyMaterialStore> KeyExchangeManager<T, S> {
    pub fn new(transport: T, store: S, backend: BackendKind) -> Self {
        KeyExchangeManager {
            transport,
            store,
            backend,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Starts an exchange with `counterparty_id`.
    ///
    /// Key material is stored before the request is opened. If opening
    /// fails, whatever was stored for the pair before is put back.
    pub fn initiate(&self, self_id: &str, counterparty_id: &str) -> Result<Uuid, ManagerError> {
        self.check_identity(self_id)?;
        if self_id == counterparty_id {
            return Err(LedgerError::SelfExchange.into());
        }

        let backend = self.fresh_backend()?;
        let pair = backend.generate_key_pair()?;
        let key = MaterialKey::new(self_id, counterparty_id);
        let record = KeyMaterialRecord::new(&pair.private_key, &pair.public_key);

        let request_id = self.store_then(&key, &record, || {
            self.transport
                .create_request(counterparty_id, &pair.public_key.to_base64(), self.backend)
                .map_err(ManagerError::from)
        })?;

        info!(%request_id, backend = %self.backend, "Key exchange initiated");
        Ok(request_id)
    }

    /// Answers a request addressed to `self_id`.
    ///
    /// On accept, returns the derived shared secret. The answer is made in
    /// the initiator's group, and a request made with another backend is
    /// refused before any key material is generated.
    pub fn respond(
        &self,
        request_id: Uuid,
        self_id: &str,
        accept: bool,
    ) -> Result<Option<SharedSecret>, ManagerError> {
        self.check_identity(self_id)?;
        let request = self.find_request(request_id, Actor::Receiver)?;
        if !request.is_pending() {
            return Err(LedgerError::NotPending(request_id).into());
        }

        if !accept {
            self.transport.confirm_or_decline(request_id, false, None)?;
            info!(%request_id, "Key exchange declined");
            return Ok(None);
        }

        if request.backend != self.backend {
            return Err(ManagerError::BackendMismatch {
                request_id,
                requested: request.backend,
                configured: self.backend,
            });
        }

        let peer = PublicKey::from_base64(&request.sender_public_key)?;
        let backend = Backend::for_peer_key(request.backend, &peer)?;
        let pair = backend.generate_key_pair()?;
        let secret = backend.derive_shared_secret(&pair.private_key, &peer)?;
        debug!(%request_id, peer = %peer.fingerprint(), "Derived shared secret as receiver");

        let key = MaterialKey::new(self_id, request.sender_id.as_str());
        let record =
            KeyMaterialRecord::new(&pair.private_key, &pair.public_key).with_shared_secret(&secret);

        self.store_then(&key, &record, || {
            self.transport
                .confirm_or_decline(request_id, true, Some(&pair.public_key.to_base64()))
                .map_err(ManagerError::from)
        })?;

        info!(%request_id, "Key exchange confirmed");
        Ok(Some(secret))
    }

    /// Completes an exchange we initiated, once the counterparty confirmed.
    pub fn finalize(&self, request_id: Uuid, self_id: &str) -> Result<SharedSecret, ManagerError> {
        self.check_identity(self_id)?;
        let request = self.find_request(request_id, Actor::Sender)?;
        if request.status != RequestStatus::Confirmed {
            return Err(ManagerError::NotConfirmed {
                request_id,
                status: request.status,
            });
        }

        let key = MaterialKey::new(self_id, request.receiver_id.as_str());
        let record = self
            .store
            .get(&key)?
            .ok_or_else(|| ManagerError::MissingKeyMaterial(key.to_string()))?;
        if record.encoded_public_key() != request.sender_public_key {
            return Err(ManagerError::StaleKeyMaterial(key.to_string()));
        }

        let peer_text = request
            .receiver_public_key
            .as_deref()
            .ok_or(LedgerError::MissingPublicKey)?;
        let peer = PublicKey::from_base64(peer_text)?;

        let private_key = record.private_key()?;
        let backend = Backend::for_private_key(request.backend, &private_key)?;
        let secret = backend.derive_shared_secret(&private_key, &peer)?;

        self.store.put(&key, &record.with_shared_secret(&secret))?;
        info!(%request_id, peer = %peer.fingerprint(), "Key exchange finalized");
        Ok(secret)
    }

    /// Our public key for every counterparty we hold material for.
    pub fn public_keys(&self, self_id: &str) -> Result<Vec<(String, PublicKey)>, ManagerError> {
        let mut keys = Vec::new();
        for key in self.store.list(self_id)? {
            if let Some(record) = self.store.get(&key)? {
                keys.push((key.counterparty_id.clone(), record.public_key()?));
            }
        }
        Ok(keys)
    }

    /// The derived secret shared with `counterparty_id`, if the exchange completed.
    pub fn shared_secret(
        &self,
        self_id: &str,
        counterparty_id: &str,
    ) -> Result<Option<SharedSecret>, ManagerError> {
        let key = MaterialKey::new(self_id, counterparty_id);
        let record = self
            .store
            .get(&key)?
            .ok_or_else(|| ManagerError::MissingKeyMaterial(key.to_string()))?;
        Ok(record.shared_secret()?)
    }

    fn check_identity(&self, self_id: &str) -> Result<(), ManagerError> {
        if self.transport.identity() != self_id {
            return Err(ManagerError::IdentityMismatch {
                transport: self.transport.identity().to_string(),
                requested: self_id.to_string(),
            });
        }
        Ok(())
    }

    /// Backend for opening a new exchange.
    fn fresh_backend(&self) -> Result<Backend, ManagerError> {
        match self.backend {
            BackendKind::Ecdh => Ok(Backend::ecdh()),
            BackendKind::Classical => {
                let encoded = self.transport.fetch_parameters()?;
                let parameters = DhParameters::from_encoded(&encoded)?;
                Ok(Backend::classical(parameters)?)
            }
        }
    }

    fn find_request(&self, request_id: Uuid, as_actor: Actor) -> Result<ExchangeRequest, ManagerError> {
        self.transport
            .list_requests()?
            .into_iter()
            .find(|view| view.request.id == request_id && view.actor == as_actor)
            .map(|view| view.request)
            .ok_or_else(|| LedgerError::NotFound(request_id).into())
    }

    /// Stores `record`, runs `publish`, and rolls the store back if it fails.
    fn store_then<R>(
        &self,
        key: &MaterialKey,
        record: &KeyMaterialRecord,
        publish: impl FnOnce() -> Result<R, ManagerError>,
    ) -> Result<R, ManagerError> {
        let previous = self.store.get(key)?;
        self.store.put(key, record)?;
        debug!(%key, "Stored key material");

        match publish() {
            Ok(value) => Ok(value),
            Err(e) => {
                let restored = match &previous {
                    Some(old) => self.store.put(key, old),
                    None => self.store.delete(key),
                };
                if let Err(restore_err) = restored {
                    debug!(%key, error = %restore_err, "Failed to restore key material");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Ledger, MemoryLedger};
    use crate::registry::MemoryParameterRegistry;
    use crate::storage::MemoryKeyMaterialStore;
    use crate::transport::LocalTransport;
    use std::sync::Arc;

    fn manager(identity: &str) -> KeyExchangeManager<LocalTransport, MemoryKeyMaterialStore> {
        let transport = LocalTransport::new(
            Arc::new(MemoryLedger::new()),
            Arc::new(MemoryParameterRegistry::new()),
            identity,
        );
        KeyExchangeManager::new(transport, MemoryKeyMaterialStore::new(), BackendKind::Ecdh)
    }

    #[test]
    fn test_identity_mismatch() {
        let alice = manager("alice");
        assert!(matches!(
            alice.initiate("mallory", "bob"),
            Err(ManagerError::IdentityMismatch { .. })
        ));
    }

    #[test]
    fn test_self_exchange_stores_nothing() {
        let alice = manager("alice");
        let err = alice.initiate("alice", "alice").unwrap_err();
        assert_eq!(err.ledger_error(), Some(&LedgerError::SelfExchange));
        assert!(alice.store().list("alice").unwrap().is_empty());
    }

    #[test]
    fn test_failed_create_restores_previous_material() {
        let alice = manager("alice");
        alice.initiate("alice", "bob").unwrap();
        let before = alice.public_keys("alice").unwrap();

        let err = alice.initiate("alice", "bob").unwrap_err();
        assert_eq!(err.ledger_error(), Some(&LedgerError::AlreadyExists));
        assert_eq!(alice.public_keys("alice").unwrap(), before);
    }

    #[test]
    fn test_classical_without_parameters() {
        let transport = LocalTransport::new(
            Arc::new(MemoryLedger::new()),
            Arc::new(MemoryParameterRegistry::new()),
            "alice",
        );
        let alice =
            KeyExchangeManager::new(transport, MemoryKeyMaterialStore::new(), BackendKind::Classical);

        assert!(matches!(
            alice.initiate("alice", "bob"),
            Err(ManagerError::Transport(crate::transport::TransportError::Registry(
                crate::registry::RegistryError::NotFound
            )))
        ));
        assert!(alice.store().list("alice").unwrap().is_empty());
    }

    #[test]
    fn test_respond_refuses_other_backend() {
        let ledger = Arc::new(MemoryLedger::new());
        let registry = Arc::new(MemoryParameterRegistry::new());
        let alice = KeyExchangeManager::new(
            LocalTransport::new(ledger.clone(), registry.clone(), "alice"),
            MemoryKeyMaterialStore::new(),
            BackendKind::Ecdh,
        );
        let bob = KeyExchangeManager::new(
            LocalTransport::new(ledger.clone(), registry, "bob"),
            MemoryKeyMaterialStore::new(),
            BackendKind::Classical,
        );

        let id = alice.initiate("alice", "bob").unwrap();
        assert!(matches!(
            bob.respond(id, "bob", true),
            Err(ManagerError::BackendMismatch {
                requested: BackendKind::Ecdh,
                configured: BackendKind::Classical,
                ..
            })
        ));
        assert!(bob.store().list("bob").unwrap().is_empty());
        assert!(ledger.get(id).unwrap().unwrap().is_pending());

        // Declining needs no key material, so it still works
        assert!(bob.respond(id, "bob", false).unwrap().is_none());
    }

    #[test]
    fn test_respond_to_own_request_is_not_found() {
        let alice = manager("alice");
        let id = alice.initiate("alice", "bob").unwrap();
        let err = alice.respond(id, "alice", true).unwrap_err();
        assert_eq!(err.ledger_error(), Some(&LedgerError::NotFound(id)));
    }

    #[test]
    fn test_shared_secret_missing_record() {
        let alice = manager("alice");
        assert!(matches!(
            alice.shared_secret("alice", "bob"),
            Err(ManagerError::MissingKeyMaterial(_))
        ));
    }
}
