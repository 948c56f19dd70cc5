//! CLI Configuration

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use keyx_core::agreement::encoding;
use keyx_core::{
    BackendKind, FileKeyMaterialStore, HttpTransport, HttpTransportConfig, KeyExchangeManager,
    SymmetricKey,
};

/// Manager as the CLI runs it: remote ledger, local files.
pub type CliManager = KeyExchangeManager<HttpTransport, FileKeyMaterialStore>;

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Data directory for key material.
    pub data_dir: PathBuf,
    /// Key exchange server URL.
    pub server_url: String,
    /// Identity to act as.
    pub user: Option<String>,
    /// Key agreement backend for new exchanges.
    pub backend: BackendKind,
    /// Base64 storage key; key material is written in plaintext without one.
    pub storage_key: Option<String>,
}

impl CliConfig {
    /// Default data directory: `~/.keyx`.
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".keyx")
    }

    /// Returns the key material directory.
    pub fn keys_path(&self) -> PathBuf {
        self.data_dir.join("keys")
    }

    /// Returns the configured identity, or fails with a hint.
    pub fn user(&self) -> Result<&str> {
        match self.user.as_deref() {
            Some(user) if !user.trim().is_empty() => Ok(user),
            _ => bail!("No user given. Pass --user <name> or set KEYX_USER."),
        }
    }

    /// Decodes the storage key, if one is configured.
    pub fn storage_key(&self) -> Result<Option<SymmetricKey>> {
        let Some(text) = self.storage_key.as_deref() else {
            return Ok(None);
        };

        let bytes = encoding::decode(text.trim()).context("KEYX_STORAGE_KEY is not valid base64")?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("KEYX_STORAGE_KEY must decode to 32 bytes"))?;
        Ok(Some(SymmetricKey::from_bytes(arr)))
    }

    /// Opens the local key material store.
    pub fn open_store(&self) -> Result<FileKeyMaterialStore> {
        let store = match self.storage_key()? {
            Some(key) => FileKeyMaterialStore::encrypted(self.keys_path(), key),
            None => FileKeyMaterialStore::new(self.keys_path()),
        };
        Ok(store)
    }

    /// Connects to the server as the configured user.
    pub fn transport(&self) -> Result<HttpTransport> {
        let config = HttpTransportConfig::new(&self.server_url, self.user()?);
        HttpTransport::new(config)
            .with_context(|| format!("Failed to set up client for {}", self.server_url))
    }

    /// Builds the exchange manager for the configured user.
    pub fn manager(&self) -> Result<CliManager> {
        Ok(KeyExchangeManager::new(
            self.transport()?,
            self.open_store()?,
            self.backend,
        ))
    }
}
