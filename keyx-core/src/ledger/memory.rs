// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! In-memory ledger.

use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::agreement::BackendKind;

use super::{
    check_answer, check_create, normalized_pair, ExchangeRequest, ExchangeRequestView, Ledger,
    LedgerError,
};

/// Ledger held in process memory.
///
/// A single lock covers every operation, so each check-then-write is atomic.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    requests: Mutex<Vec<ExchangeRequest>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<ExchangeRequest>>, LedgerError> {
        self.requests
            .lock()
            .map_err(|_| LedgerError::Storage("ledger lock poisoned".to_string()))
    }

    /// Number of requests ever recorded.
    pub fn len(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Ledger for MemoryLedger {
    fn create(
        &self,
        sender_id: &str,
        receiver_id: &str,
        sender_public_key: &str,
        backend: BackendKind,
    ) -> Result<Uuid, LedgerError> {
        check_create(sender_id, receiver_id, sender_public_key)?;

        let mut requests = self.lock()?;
        let pair = normalized_pair(sender_id, receiver_id);
        let duplicate = requests.iter().any(|r| {
            r.is_pending() && normalized_pair(&r.sender_id, &r.receiver_id) == pair
        });
        if duplicate {
            return Err(LedgerError::AlreadyExists);
        }

        let request = ExchangeRequest::new(sender_id, receiver_id, sender_public_key, backend);
        let id = request.id;
        requests.push(request);
        Ok(id)
    }

    fn list_for(&self, identity: &str) -> Result<Vec<ExchangeRequestView>, LedgerError> {
        let requests = self.lock()?;
        Ok(requests
            .iter()
            .filter_map(|r| {
                r.actor_for(identity).map(|actor| ExchangeRequestView {
                    actor,
                    request: r.clone(),
                })
            })
            .collect())
    }

    fn get(&self, request_id: Uuid) -> Result<Option<ExchangeRequest>, LedgerError> {
        let requests = self.lock()?;
        Ok(requests.iter().find(|r| r.id == request_id).cloned())
    }

    fn confirm_or_decline(
        &self,
        request_id: Uuid,
        acting_identity: &str,
        confirmed: bool,
        receiver_public_key: Option<&str>,
    ) -> Result<(), LedgerError> {
        let mut requests = self.lock()?;
        let request = requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or(LedgerError::NotFound(request_id))?;

        check_answer(request, acting_identity, confirmed, receiver_public_key)?;
        request.resolve(confirmed, receiver_public_key);
        Ok(())
    }
}
