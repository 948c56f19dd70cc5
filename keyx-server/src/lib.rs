//! Keyx Server
//!
//! Hosts the parameter registry and the exchange request ledger behind an
//! HTTP API. Holds public keys only; secrets are derived by the clients.

pub mod config;
pub mod http;
pub mod metrics;

use std::sync::Arc;
use std::time::Instant;

use keyx_core::{
    Ledger, MemoryLedger, MemoryParameterRegistry, ParameterRegistry, SqliteLedger,
    SqliteParameterRegistry,
};

use config::{ServerConfig, StorageBackend};
use http::AppState;
use metrics::ServerMetrics;

/// Boxed error for server start-up.
pub type StartupError = Box<dyn std::error::Error + Send + Sync>;

/// Opens the ledger and registry for the configured backend.
pub fn open_stores(
    config: &ServerConfig,
) -> Result<(Arc<dyn Ledger>, Arc<dyn ParameterRegistry>), StartupError> {
    match config.storage_backend {
        StorageBackend::Memory => Ok((
            Arc::new(MemoryLedger::new()),
            Arc::new(MemoryParameterRegistry::new()),
        )),
        StorageBackend::Sqlite => {
            std::fs::create_dir_all(&config.data_dir)?;
            let ledger = SqliteLedger::open(config.data_dir.join("ledger.db"))?;
            let registry = SqliteParameterRegistry::open(config.data_dir.join("parameters.db"))?;
            Ok((Arc::new(ledger), Arc::new(registry)))
        }
    }
}

/// Builds handler state from configuration.
pub fn build_state(config: &ServerConfig) -> Result<AppState, StartupError> {
    let (ledger, registry) = open_stores(config)?;
    Ok(AppState {
        ledger,
        registry,
        metrics: ServerMetrics::new()?,
        start_time: Instant::now(),
        max_parameters_bytes: config.max_parameters_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyx_core::BackendKind;
    use tempfile::TempDir;

    #[test]
    fn test_sqlite_stores_persist() {
        let temp_dir = TempDir::new().unwrap();
        let config = ServerConfig {
            storage_backend: StorageBackend::Sqlite,
            data_dir: temp_dir.path().join("state"),
            ..ServerConfig::default()
        };

        {
            let (ledger, _) = open_stores(&config).unwrap();
            ledger.create("alice", "bob", "QUFB", BackendKind::Ecdh).unwrap();
        }

        let state = build_state(&config).unwrap();
        assert_eq!(state.ledger.list_for("bob").unwrap().len(), 1);
        assert!(temp_dir.path().join("state").join("ledger.db").exists());
        assert!(temp_dir.path().join("state").join("parameters.db").exists());
    }

    #[test]
    fn test_memory_stores_start_empty() {
        let config = ServerConfig {
            storage_backend: StorageBackend::Memory,
            ..ServerConfig::default()
        };
        let state = build_state(&config).unwrap();
        assert!(state.ledger.list_for("alice").unwrap().is_empty());
        assert!(state.registry.latest_parameters().is_err());
    }
}
