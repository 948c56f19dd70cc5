// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! File-based key material store.
//!
//! Layout: `<root>/<self>/<counterparty>/{private_key,public_key,shared_secret}.txt`,
//! where each identity is stored as `id-` followed by its lowercase hex
//! UTF-8 bytes. Distinct identities never share a directory, even on
//! case-insensitive file systems.
//!
//! A record is written into a hidden staging directory next to its final
//! location and swapped in by rename. If a swap is interrupted, the next
//! access removes leftover staging directories and restores the retired
//! record when the new one never landed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;
use uuid::Uuid;

use super::{KeyMaterialRecord, KeyMaterialStore, MaterialKey, StorageError};
use crate::crypto::{decrypt_with_aad, encrypt_with_aad, SymmetricKey};

const PRIVATE_KEY_FILE: &str = "private_key.txt";
const PUBLIC_KEY_FILE: &str = "public_key.txt";
const SHARED_SECRET_FILE: &str = "shared_secret.txt";

const DIR_PREFIX: &str = "id-";

const STAGING_MARKER: &str = "staging-";
const RETIRED_MARKER: &str = "retired-";

/// Key material store rooted at a directory.
///
/// With an encryption key, every artifact is sealed with XChaCha20-Poly1305
/// and bound to its file name.
pub struct FileKeyMaterialStore {
    root: PathBuf,
    encryption_key: Option<SymmetricKey>,
    write_lock: Mutex<()>,
}

impl FileKeyMaterialStore {
    /// Creates a store that keeps artifacts as plain base64 text.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileKeyMaterialStore {
            root: root.into(),
            encryption_key: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a store that encrypts artifacts at rest.
    pub fn encrypted(root: impl Into<PathBuf>, encryption_key: SymmetricKey) -> Self {
        FileKeyMaterialStore {
            root: root.into(),
            encryption_key: Some(encryption_key),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption_key.is_some()
    }

    fn self_dir(&self, self_id: &str) -> PathBuf {
        self.root.join(dir_name(self_id))
    }

    /// Directory holding the artifacts of one record.
    pub fn record_dir(&self, key: &MaterialKey) -> PathBuf {
        self.self_dir(&key.self_id).join(dir_name(&key.counterparty_id))
    }

    fn write_artifact(&self, dir: &Path, name: &str, value: &str) -> Result<(), StorageError> {
        let bytes = match &self.encryption_key {
            Some(key) => encrypt_with_aad(key, value.as_bytes(), name.as_bytes())
                .map_err(|e| StorageError::Encryption(e.to_string()))?,
            None => value.as_bytes().to_vec(),
        };
        fs::write(dir.join(name), bytes)?;
        Ok(())
    }

    fn read_artifact(&self, dir: &Path, name: &str) -> Result<Option<String>, StorageError> {
        let path = dir.join(name);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        let plain = match &self.encryption_key {
            Some(key) => decrypt_with_aad(key, &bytes, name.as_bytes())
                .map_err(|e| StorageError::Encryption(format!("{}: {}", name, e)))?,
            None => bytes,
        };
        String::from_utf8(plain)
            .map(Some)
            .map_err(|_| StorageError::Corrupted(format!("{} is not valid text", name)))
    }

    fn write_record(&self, dir: &Path, record: &KeyMaterialRecord) -> Result<(), StorageError> {
        self.write_artifact(dir, PRIVATE_KEY_FILE, record.encoded_private_key())?;
        self.write_artifact(dir, PUBLIC_KEY_FILE, record.encoded_public_key())?;
        if let Some(secret) = record.encoded_shared_secret() {
            self.write_artifact(dir, SHARED_SECRET_FILE, secret)?;
        }
        Ok(())
    }
}

/// Maps an identity to a single path component, one-to-one.
fn dir_name(identity: &str) -> String {
    format!("{}{}", DIR_PREFIX, hex::encode(identity))
}

/// Inverse of [`dir_name`]; `None` for directories this store did not create.
fn identity_of(dir_name: &str) -> Option<String> {
    let encoded = dir_name.strip_prefix(DIR_PREFIX)?;
    let bytes = hex::decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

fn hidden_name(record_name: &str, marker: &str) -> String {
    format!(".{}.{}{}", record_name, marker, Uuid::new_v4())
}

/// Rolls back or cleans up an interrupted swap of `record_dir`.
fn recover(record_dir: &Path) -> Result<(), StorageError> {
    let (Some(parent), Some(record_name)) = (
        record_dir.parent(),
        record_dir.file_name().and_then(|n| n.to_str()),
    ) else {
        return Ok(());
    };
    if !parent.is_dir() {
        return Ok(());
    }

    let staging_prefix = format!(".{}.{}", record_name, STAGING_MARKER);
    let retired_prefix = format!(".{}.{}", record_name, RETIRED_MARKER);

    let mut leftovers = Vec::new();
    for entry in fs::read_dir(parent)? {
        let name = entry?.file_name();
        if let Some(name) = name.to_str() {
            if name.starts_with(&staging_prefix) || name.starts_with(&retired_prefix) {
                leftovers.push(name.to_string());
            }
        }
    }

    for name in leftovers {
        let path = parent.join(&name);
        if name.starts_with(&staging_prefix) {
            warn!(record = record_name, "Discarding interrupted key material write");
            fs::remove_dir_all(&path)?;
        } else if record_dir.exists() {
            fs::remove_dir_all(&path)?;
        } else {
            warn!(record = record_name, "Restoring previous key material");
            fs::rename(&path, record_dir)?;
        }
    }
    Ok(())
}

impl KeyMaterialStore for FileKeyMaterialStore {
    fn put(&self, key: &MaterialKey, record: &KeyMaterialRecord) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;

        let target = self.record_dir(key);
        let parent = self.self_dir(&key.self_id);
        let record_name = dir_name(&key.counterparty_id);
        fs::create_dir_all(&parent)?;
        recover(&target)?;

        let staging = parent.join(hidden_name(&record_name, STAGING_MARKER));
        fs::create_dir(&staging)?;
        if let Err(e) = self.write_record(&staging, record) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if target.exists() {
            let retired = parent.join(hidden_name(&record_name, RETIRED_MARKER));
            fs::rename(&target, &retired)?;
            fs::rename(&staging, &target)?;
            fs::remove_dir_all(&retired)?;
        } else {
            fs::rename(&staging, &target)?;
        }
        Ok(())
    }

    fn get(&self, key: &MaterialKey) -> Result<Option<KeyMaterialRecord>, StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;

        let dir = self.record_dir(key);
        recover(&dir)?;
        if !dir.is_dir() {
            return Ok(None);
        }

        let missing = |name: &str| StorageError::Corrupted(format!("{} missing for {}", name, key));
        let private_key = self
            .read_artifact(&dir, PRIVATE_KEY_FILE)?
            .ok_or_else(|| missing(PRIVATE_KEY_FILE))?;
        let public_key = self
            .read_artifact(&dir, PUBLIC_KEY_FILE)?
            .ok_or_else(|| missing(PUBLIC_KEY_FILE))?;
        let shared_secret = self.read_artifact(&dir, SHARED_SECRET_FILE)?;

        Ok(Some(KeyMaterialRecord::from_encoded(
            private_key,
            public_key,
            shared_secret,
        )))
    }

    fn delete(&self, key: &MaterialKey) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;

        let dir = self.record_dir(key);
        recover(&dir)?;
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    fn list(&self, self_id: &str) -> Result<Vec<MaterialKey>, StorageError> {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;

        let dir = self.self_dir(self_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }

        let hidden: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| name.starts_with('.'))
            .collect();

        // A retired directory may be the only trace of a record mid-swap.
        for name in hidden {
            let Some((record_name, _)) = name[1..].split_once(&format!(".{}", RETIRED_MARKER))
            else {
                continue;
            };
            let record_dir = dir.join(record_name);
            recover(&record_dir)?;
            if record_dir.is_dir() && !names.iter().any(|n| n == record_name) {
                names.push(record_name.to_string());
            }
        }

        let mut counterparties: Vec<String> =
            names.iter().filter_map(|name| identity_of(name)).collect();
        counterparties.sort();
        Ok(counterparties
            .into_iter()
            .map(|counterparty| MaterialKey::new(self_id, counterparty))
            .collect())
    }
}
