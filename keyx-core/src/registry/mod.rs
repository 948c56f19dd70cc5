// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Parameter Registry
//!
//! Stores uploaded classical Diffie-Hellman parameter sets and serves the
//! most recently created one. Entries are append-only.

mod sqlite;

pub use sqlite::SqliteParameterRegistry;

use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

use crate::agreement::DhParameters;
use crate::unix_millis;

/// Registry error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No Diffie-Hellman parameters have been uploaded")]
    NotFound,

    #[error("Malformed Diffie-Hellman parameters: {0}")]
    MalformedParameters(String),

    #[error("Registry storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for RegistryError {
    fn from(e: rusqlite::Error) -> Self {
        RegistryError::Storage(e.to_string())
    }
}

/// One uploaded parameter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhParameterSet {
    pub id: u64,
    /// Parameter bytes exactly as uploaded (PEM or DER).
    pub parameters: Vec<u8>,
    /// Unix timestamp in milliseconds.
    pub created_at: u64,
}

impl DhParameterSet {
    /// Parses the stored bytes.
    pub fn decode(&self) -> Result<DhParameters, RegistryError> {
        parse_parameters(&self.parameters)
    }
}

/// Checks that uploaded bytes parse as a parameter set.
///
/// Only the encoding is checked here. Group strength is judged by the
/// classical backend when a client builds one from these parameters.
pub(crate) fn parse_parameters(bytes: &[u8]) -> Result<DhParameters, RegistryError> {
    if bytes.is_empty() {
        return Err(RegistryError::MalformedParameters(
            "empty upload".to_string(),
        ));
    }
    DhParameters::from_encoded(bytes).map_err(|e| RegistryError::MalformedParameters(e.to_string()))
}

/// Store of classical DH parameter sets.
pub trait ParameterRegistry: Send + Sync {
    /// Parses and appends a parameter set, returning its id.
    fn submit_parameters(&self, parameters: &[u8]) -> Result<u64, RegistryError>;

    /// The most recently created parameter set.
    fn latest_parameters(&self) -> Result<DhParameterSet, RegistryError>;
}

/// Registry held in process memory.
#[derive(Debug, Default)]
pub struct MemoryParameterRegistry {
    entries: Mutex<Vec<DhParameterSet>>,
}

impl MemoryParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<DhParameterSet>>, RegistryError> {
        self.entries
            .lock()
            .map_err(|_| RegistryError::Storage("registry lock poisoned".to_string()))
    }
}

impl ParameterRegistry for MemoryParameterRegistry {
    fn submit_parameters(&self, parameters: &[u8]) -> Result<u64, RegistryError> {
        parse_parameters(parameters)?;

        let mut entries = self.lock()?;
        let id = entries.len() as u64 + 1;
        entries.push(DhParameterSet {
            id,
            parameters: parameters.to_vec(),
            created_at: unix_millis(),
        });
        Ok(id)
    }

    fn latest_parameters(&self) -> Result<DhParameterSet, RegistryError> {
        let entries = self.lock()?;
        // Ids grow with insertion order, so the last entry wins timestamp ties.
        entries
            .iter()
            .max_by_key(|e| (e.created_at, e.id))
            .cloned()
            .ok_or(RegistryError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pem() -> Vec<u8> {
        DhParameters::rfc3526_modp_2048().to_pem().unwrap().into_bytes()
    }

    #[test]
    fn test_empty_registry() {
        let registry = MemoryParameterRegistry::new();
        assert_eq!(registry.latest_parameters(), Err(RegistryError::NotFound));
    }

    #[test]
    fn test_latest_wins() {
        let registry = MemoryParameterRegistry::new();
        let first = registry.submit_parameters(&pem()).unwrap();
        let der = DhParameters::rfc3526_modp_2048().to_der().unwrap();
        let second = registry.submit_parameters(&der).unwrap();

        assert!(second > first);
        let latest = registry.latest_parameters().unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.parameters, der);
    }

    #[test]
    fn test_rejects_garbage() {
        let registry = MemoryParameterRegistry::new();
        assert!(matches!(
            registry.submit_parameters(b"hello"),
            Err(RegistryError::MalformedParameters(_))
        ));
        assert!(matches!(
            registry.submit_parameters(b""),
            Err(RegistryError::MalformedParameters(_))
        ));
        assert_eq!(registry.latest_parameters(), Err(RegistryError::NotFound));
    }

    #[test]
    fn test_decode_stored_bytes() {
        let registry = MemoryParameterRegistry::new();
        registry.submit_parameters(&pem()).unwrap();
        let decoded = registry.latest_parameters().unwrap().decode().unwrap();
        assert_eq!(decoded, DhParameters::rfc3526_modp_2048());
    }

    #[test]
    fn test_accepts_weak_but_well_formed_group() {
        let registry = MemoryParameterRegistry::new();
        let weak = DhParameters::new(23u32.into(), 5u32.into()).to_der().unwrap();

        let id = registry.submit_parameters(&weak).unwrap();
        assert_eq!(registry.latest_parameters().unwrap().id, id);
    }
}
