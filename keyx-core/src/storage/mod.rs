// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Key-Material Store
//!
//! Local persistence of per-counterparty key material: the private key
//! handle, our public key, and once derived, the shared secret. Records
//! are namespaced by `(self, counterparty)` and replaced as a whole.

mod error;
mod file;

pub use error::StorageError;
pub use file::FileKeyMaterialStore;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use zeroize::Zeroize;

use crate::agreement::{AgreementError, PrivateKey, PublicKey, SharedSecret};

/// Namespace of one record: who we are, and who the exchange is with.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialKey {
    pub self_id: String,
    pub counterparty_id: String,
}

impl MaterialKey {
    pub fn new(self_id: impl Into<String>, counterparty_id: impl Into<String>) -> Self {
        MaterialKey {
            self_id: self_id.into(),
            counterparty_id: counterparty_id.into(),
        }
    }
}

impl fmt::Display for MaterialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.self_id, self.counterparty_id)
    }
}

/// Base64-encoded key material for one counterparty.
#[derive(Clone, PartialEq, Eq, Zeroize)]
pub struct KeyMaterialRecord {
    private_key: String,
    public_key: String,
    shared_secret: Option<String>,
}

impl KeyMaterialRecord {
    /// A fresh record holding a newly generated key pair.
    pub fn new(private_key: &PrivateKey, public_key: &PublicKey) -> Self {
        KeyMaterialRecord {
            private_key: private_key.to_base64(),
            public_key: public_key.to_base64(),
            shared_secret: None,
        }
    }

    /// Rebuilds a record from its stored text form.
    pub fn from_encoded(
        private_key: String,
        public_key: String,
        shared_secret: Option<String>,
    ) -> Self {
        KeyMaterialRecord {
            private_key,
            public_key,
            shared_secret,
        }
    }

    pub fn with_shared_secret(mut self, secret: &SharedSecret) -> Self {
        self.shared_secret = Some(secret.to_base64());
        self
    }

    pub fn private_key(&self) -> Result<PrivateKey, AgreementError> {
        PrivateKey::from_base64(&self.private_key)
    }

    pub fn public_key(&self) -> Result<PublicKey, AgreementError> {
        PublicKey::from_base64(&self.public_key)
    }

    pub fn shared_secret(&self) -> Result<Option<SharedSecret>, AgreementError> {
        self.shared_secret
            .as_deref()
            .map(SharedSecret::from_base64)
            .transpose()
    }

    pub fn encoded_private_key(&self) -> &str {
        &self.private_key
    }

    pub fn encoded_public_key(&self) -> &str {
        &self.public_key
    }

    pub fn encoded_shared_secret(&self) -> Option<&str> {
        self.shared_secret.as_deref()
    }
}

impl fmt::Debug for KeyMaterialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterialRecord")
            .field("private_key", &"[REDACTED]")
            .field("public_key", &self.public_key)
            .field(
                "shared_secret",
                &self.shared_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Drop for KeyMaterialRecord {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Persistence for key material records.
///
/// `put` replaces any existing record under the same key in one step:
/// readers observe either the old record or the new one, never a mix.
pub trait KeyMaterialStore: Send + Sync {
    /// Stores a record, replacing any previous one.
    fn put(&self, key: &MaterialKey, record: &KeyMaterialRecord) -> Result<(), StorageError>;

    /// Loads a record. Returns None if nothing is stored under `key`.
    fn get(&self, key: &MaterialKey) -> Result<Option<KeyMaterialRecord>, StorageError>;

    /// Removes a record. Removing a missing record is not an error.
    fn delete(&self, key: &MaterialKey) -> Result<(), StorageError>;

    /// Keys of every record held for `self_id`, sorted by counterparty.
    fn list(&self, self_id: &str) -> Result<Vec<MaterialKey>, StorageError>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKeyMaterialStore {
    records: Mutex<BTreeMap<MaterialKey, KeyMaterialRecord>>,
}

impl MemoryKeyMaterialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyMaterialStore for MemoryKeyMaterialStore {
    fn put(&self, key: &MaterialKey, record: &KeyMaterialRecord) -> Result<(), StorageError> {
        let mut records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        records.insert(key.clone(), record.clone());
        Ok(())
    }

    fn get(&self, key: &MaterialKey) -> Result<Option<KeyMaterialRecord>, StorageError> {
        let records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(records.get(key).cloned())
    }

    fn delete(&self, key: &MaterialKey) -> Result<(), StorageError> {
        let mut records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        records.remove(key);
        Ok(())
    }

    fn list(&self, self_id: &str) -> Result<Vec<MaterialKey>, StorageError> {
        let records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(records
            .keys()
            .filter(|k| k.self_id == self_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agreement::{Backend, KeyAgreement};

    fn record() -> KeyMaterialRecord {
        let pair = Backend::ecdh().generate_key_pair().unwrap();
        KeyMaterialRecord::new(&pair.private_key, &pair.public_key)
    }

    #[test]
    fn test_memory_store_put_get_delete() {
        let store = MemoryKeyMaterialStore::new();
        let key = MaterialKey::new("alice", "bob");
        let record = record();

        assert!(store.get(&key).unwrap().is_none());
        store.put(&key, &record).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(record));

        store.delete(&key).unwrap();
        assert!(store.get(&key).unwrap().is_none());
        store.delete(&key).unwrap();
    }

    #[test]
    fn test_memory_store_list_scoped_to_self() {
        let store = MemoryKeyMaterialStore::new();
        store.put(&MaterialKey::new("alice", "carol"), &record()).unwrap();
        store.put(&MaterialKey::new("alice", "bob"), &record()).unwrap();
        store.put(&MaterialKey::new("bob", "alice"), &record()).unwrap();

        let keys = store.list("alice").unwrap();
        assert_eq!(
            keys,
            vec![
                MaterialKey::new("alice", "bob"),
                MaterialKey::new("alice", "carol")
            ]
        );
    }

    #[test]
    fn test_record_decodes_material() {
        let pair = Backend::ecdh().generate_key_pair().unwrap();
        let secret = SharedSecret::derive(b"raw agreement output");
        let record =
            KeyMaterialRecord::new(&pair.private_key, &pair.public_key).with_shared_secret(&secret);

        assert_eq!(record.public_key().unwrap(), pair.public_key);
        assert_eq!(
            record.private_key().unwrap().as_bytes(),
            pair.private_key.as_bytes()
        );
        assert_eq!(record.shared_secret().unwrap(), Some(secret));
    }

    #[test]
    fn test_record_debug_redacts() {
        let record = record().with_shared_secret(&SharedSecret::derive(b"x"));
        let debug = format!("{:?}", record);
        assert!(!debug.contains(record.encoded_private_key()));
        assert!(!debug.contains(record.encoded_shared_secret().unwrap()));
        assert!(debug.contains(record.encoded_public_key()));
    }
}
