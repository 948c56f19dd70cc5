//! Keyx Core Library
//!
//! Pairwise Diffie-Hellman key exchange between named identities, brokered
//! by a shared ledger of exchange requests. Private keys and derived secrets
//! never leave the party that owns them.

pub mod agreement;
pub mod crypto;
pub mod ledger;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod storage;
pub mod transport;

pub use agreement::{
    AgreementError, Backend, BackendKind, DhParameters, KeyAgreement, KeyPair, PrivateKey,
    PublicKey, SharedSecret,
};
pub use crypto::{decrypt, encrypt, SymmetricKey};
pub use ledger::{
    Actor, ExchangeRequest, ExchangeRequestView, Ledger, LedgerError, MemoryLedger,
    RequestStatus, SqliteLedger,
};
pub use manager::{KeyExchangeManager, ManagerError};
pub use registry::{
    DhParameterSet, MemoryParameterRegistry, ParameterRegistry, RegistryError,
    SqliteParameterRegistry,
};
pub use storage::{
    FileKeyMaterialStore, KeyMaterialRecord, KeyMaterialStore, MaterialKey,
    MemoryKeyMaterialStore, StorageError,
};
#[cfg(feature = "http")]
pub use transport::{HttpTransport, HttpTransportConfig};
pub use transport::{KeyExchangeTransport, LocalTransport, TransportError, TransportResult};

/// Current Unix time in milliseconds.
pub(crate) fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
