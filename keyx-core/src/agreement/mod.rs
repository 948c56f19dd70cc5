// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Key Agreement Module
//!
//! Two interchangeable Diffie-Hellman backends behind one contract:
//! X25519 (no shared parameters) and classical finite-field DH over a
//! parameter set distributed by the registry. Both hash the raw agreement
//! output with SHA-256 into a 32-byte shared secret.

mod asn1;
mod classical;
mod ecdh;
pub mod encoding;
mod error;
mod params;

pub use classical::{ClassicalBackend, PRIVATE_EXPONENT_BITS};
pub use ecdh::{EcdhBackend, X25519_KEY_LEN};
pub use error::AgreementError;
pub use params::{DhParameters, MIN_MODULUS_BITS};

use std::fmt;
use std::str::FromStr;

use ring::digest::{digest, SHA256};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::SymmetricKey;

/// Shared secret length in bytes.
pub const SHARED_SECRET_LEN: usize = 32;

/// Which Diffie-Hellman variant a party uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// X25519 elliptic-curve Diffie-Hellman.
    #[default]
    Ecdh,
    /// Finite-field Diffie-Hellman over registry parameters.
    Classical,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ecdh => "ecdh",
            BackendKind::Classical => "classical",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ecdh" | "x25519" | "cng" => Ok(BackendKind::Ecdh),
            "classical" | "dh" | "openssl" => Ok(BackendKind::Classical),
            other => Err(format!("unknown key agreement backend: {}", other)),
        }
    }
}

/// Public half of a key pair, as exchanged over the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    bytes: Vec<u8>,
}

impl PublicKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        PublicKey { bytes }
    }

    /// Decodes a peer key; undecodable text is an invalid peer key.
    pub fn from_base64(text: &str) -> Result<Self, AgreementError> {
        let bytes = encoding::decode(text)
            .map_err(|_| AgreementError::InvalidPeerKey("not valid base64".to_string()))?;
        Ok(PublicKey { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        encoding::encode(&self.bytes)
    }

    /// Short hex fingerprint for display.
    pub fn fingerprint(&self) -> String {
        let hash = digest(&SHA256, &self.bytes);
        hex::encode(&hash.as_ref()[..8])
    }
}

/// Opaque private key handle. Never leaves the local party.
#[derive(Clone, Zeroize)]
pub struct PrivateKey {
    bytes: Vec<u8>,
}

impl PrivateKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        PrivateKey { bytes }
    }

    pub fn from_base64(text: &str) -> Result<Self, AgreementError> {
        encoding::decode(text).map(|bytes| PrivateKey { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        encoding::encode(&self.bytes)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Symmetric secret both parties derive independently.
#[derive(Clone, PartialEq, Eq, Zeroize)]
pub struct SharedSecret {
    bytes: [u8; SHARED_SECRET_LEN],
}

impl SharedSecret {
    /// Hashes raw Diffie-Hellman output into a shared secret.
    pub fn derive(raw: &[u8]) -> Self {
        let hash = digest(&SHA256, raw);
        let mut bytes = [0u8; SHARED_SECRET_LEN];
        bytes.copy_from_slice(hash.as_ref());
        SharedSecret { bytes }
    }

    pub fn from_base64(text: &str) -> Result<Self, AgreementError> {
        let mut decoded = encoding::decode(text)?;
        let result = <[u8; SHARED_SECRET_LEN]>::try_from(decoded.as_slice())
            .map(|bytes| SharedSecret { bytes })
            .map_err(|_| AgreementError::InvalidEncoding);
        decoded.zeroize();
        result
    }

    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_LEN] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        encoding::encode(&self.bytes)
    }

    /// Uses the secret as a message encryption key.
    pub fn symmetric_key(&self) -> SymmetricKey {
        SymmetricKey::from_bytes(self.bytes)
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// A freshly generated key pair.
#[derive(Debug)]
pub struct KeyPair {
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
}

/// Contract shared by both Diffie-Hellman variants.
///
/// For any two pairs generated by the same backend (same curve, or same
/// parameter set), `derive(a.private, b.public) == derive(b.private, a.public)`.
pub trait KeyAgreement {
    /// Which variant this is.
    fn kind(&self) -> BackendKind;

    /// Generates a new key pair.
    fn generate_key_pair(&self) -> Result<KeyPair, AgreementError>;

    /// Derives the shared secret from our private key and the peer's public key.
    ///
    /// Fails with `InvalidPeerKey` if the peer key is not a valid element
    /// of the group.
    fn derive_shared_secret(
        &self,
        private_key: &PrivateKey,
        peer_public_key: &PublicKey,
    ) -> Result<SharedSecret, AgreementError>;
}

/// Backend selected by configuration.
#[derive(Debug, Clone)]
pub enum Backend {
    Ecdh(EcdhBackend),
    Classical(ClassicalBackend),
}

impl Backend {
    pub fn ecdh() -> Self {
        Backend::Ecdh(EcdhBackend::new())
    }

    pub fn classical(parameters: DhParameters) -> Result<Self, AgreementError> {
        ClassicalBackend::new(parameters).map(Backend::Classical)
    }

    /// Builds the backend a receiver answers `peer_public_key` with.
    ///
    /// Classical keys name their group, so the answer is made in the
    /// initiator's group whatever the registry currently serves.
    pub fn for_peer_key(
        kind: BackendKind,
        peer_public_key: &PublicKey,
    ) -> Result<Self, AgreementError> {
        match kind {
            BackendKind::Ecdh => Ok(Backend::ecdh()),
            BackendKind::Classical => {
                ClassicalBackend::for_peer_key(peer_public_key).map(Backend::Classical)
            }
        }
    }

    /// Rebuilds the backend an existing private key belongs to.
    pub fn for_private_key(
        kind: BackendKind,
        private_key: &PrivateKey,
    ) -> Result<Self, AgreementError> {
        match kind {
            BackendKind::Ecdh => Ok(Backend::ecdh()),
            BackendKind::Classical => {
                ClassicalBackend::from_private_key(private_key).map(Backend::Classical)
            }
        }
    }
}

impl KeyAgreement for Backend {
    fn kind(&self) -> BackendKind {
        match self {
            Backend::Ecdh(backend) => backend.kind(),
            Backend::Classical(backend) => backend.kind(),
        }
    }

    fn generate_key_pair(&self) -> Result<KeyPair, AgreementError> {
        match self {
            Backend::Ecdh(backend) => backend.generate_key_pair(),
            Backend::Classical(backend) => backend.generate_key_pair(),
        }
    }

    fn derive_shared_secret(
        &self,
        private_key: &PrivateKey,
        peer_public_key: &PublicKey,
    ) -> Result<SharedSecret, AgreementError> {
        match self {
            Backend::Ecdh(backend) => backend.derive_shared_secret(private_key, peer_public_key),
            Backend::Classical(backend) => {
                backend.derive_shared_secret(private_key, peer_public_key)
            }
        }
    }
}
