// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Elliptic-curve Diffie-Hellman over X25519.
//!
//! The curve is fixed, so no shared parameters are needed.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use super::{
    AgreementError, BackendKind, KeyAgreement, KeyPair, PrivateKey, PublicKey, SharedSecret,
};

/// X25519 key and point length in bytes.
pub const X25519_KEY_LEN: usize = 32;

/// X25519 key agreement.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdhBackend;

impl EcdhBackend {
    pub fn new() -> Self {
        EcdhBackend
    }
}

impl KeyAgreement for EcdhBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ecdh
    }

    fn generate_key_pair(&self) -> Result<KeyPair, AgreementError> {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);

        Ok(KeyPair {
            private_key: PrivateKey::from_bytes(secret.to_bytes().to_vec()),
            public_key: PublicKey::from_bytes(public.as_bytes().to_vec()),
        })
    }

    fn derive_shared_secret(
        &self,
        private_key: &PrivateKey,
        peer_public_key: &PublicKey,
    ) -> Result<SharedSecret, AgreementError> {
        let secret_bytes: [u8; X25519_KEY_LEN] = private_key
            .as_bytes()
            .try_into()
            .map_err(|_| AgreementError::InvalidPrivateKey)?;
        let peer_bytes: [u8; X25519_KEY_LEN] =
            peer_public_key.as_bytes().try_into().map_err(|_| {
                AgreementError::InvalidPeerKey(format!(
                    "expected {} bytes, found {}",
                    X25519_KEY_LEN,
                    peer_public_key.as_bytes().len()
                ))
            })?;

        let secret = StaticSecret::from(secret_bytes);
        let shared = secret.diffie_hellman(&X25519PublicKey::from(peer_bytes));

        // Low-order points yield an all-zero output
        if !shared.was_contributory() {
            return Err(AgreementError::InvalidPeerKey(
                "low-order point".to_string(),
            ));
        }

        Ok(SharedSecret::derive(shared.as_bytes()))
    }
}
