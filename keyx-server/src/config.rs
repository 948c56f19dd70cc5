//! Server Configuration
//!
//! Read from `KEYX_*` environment variables, with defaults for local use.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DATA_DIR: &str = "./data";
/// Parameter files are a few KB; anything much larger is not a DH parameter set.
const DEFAULT_MAX_PARAMETERS_BYTES: usize = 64 * 1024;

/// Where the ledger and registry keep their state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// Lost on restart.
    Memory,
    /// `ledger.db` and `parameters.db` under the data directory.
    #[default]
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "sqlite" => Ok(StorageBackend::Sqlite),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

/// Key exchange server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub storage_backend: StorageBackend,
    pub data_dir: PathBuf,
    /// Upper bound for an uploaded parameter file.
    pub max_parameters_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            storage_backend: StorageBackend::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            max_parameters_bytes: DEFAULT_MAX_PARAMETERS_BYTES,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`; unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();

        ServerConfig {
            listen_addr: parse_or(
                &lookup,
                "KEYX_LISTEN_ADDR",
                defaults.listen_addr,
                DEFAULT_LISTEN_ADDR,
            ),
            storage_backend: parse_or(
                &lookup,
                "KEYX_STORAGE_BACKEND",
                defaults.storage_backend,
                "sqlite",
            ),
            data_dir: lookup("KEYX_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            max_parameters_bytes: parse_or(
                &lookup,
                "KEYX_MAX_PARAMETERS_BYTES",
                defaults.max_parameters_bytes,
                "65536",
            ),
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T, shown_default: &str) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid {}={:?}, using {}", key, raw, shown_default);
            default
        }),
        None => default,
    }
}
