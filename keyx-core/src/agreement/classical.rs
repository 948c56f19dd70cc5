// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Classical finite-field Diffie-Hellman.
//!
//! Both key halves are DER `SEQUENCE { p, g, value }`. A public key tells
//! the receiver which group to answer in, and a private handle keeps the
//! group it was generated under even after the registry rotates to a newer
//! parameter set.

use num_bigint::{BigUint, RandBigInt};
use num_traits::One;
use rand::rngs::OsRng;

use super::asn1::{decode_group_value, encode_group_value};
use super::{
    AgreementError, BackendKind, DhParameters, KeyAgreement, KeyPair, PrivateKey, PublicKey,
    SharedSecret,
};

/// Length of the random private exponent.
pub const PRIVATE_EXPONENT_BITS: u64 = 512;

/// Finite-field Diffie-Hellman over registry-supplied parameters.
#[derive(Debug, Clone)]
pub struct ClassicalBackend {
    parameters: DhParameters,
}

impl ClassicalBackend {
    /// Creates a backend, rejecting parameters unfit for agreement.
    pub fn new(parameters: DhParameters) -> Result<Self, AgreementError> {
        parameters.validate()?;
        Ok(ClassicalBackend { parameters })
    }

    /// Rebuilds the backend a private key handle was generated under.
    ///
    /// Handles are only minted by a validated backend, so the group is not
    /// checked again.
    pub fn from_private_key(private_key: &PrivateKey) -> Result<Self, AgreementError> {
        let (parameters, _) = decode_private_key(private_key)?;
        Ok(ClassicalBackend { parameters })
    }

    /// Builds a backend over the group a peer's public key was made in.
    ///
    /// The group comes from the other party, so it is fully validated.
    pub fn for_peer_key(peer_public_key: &PublicKey) -> Result<Self, AgreementError> {
        let (parameters, _) = decode_public_key(peer_public_key)?;
        Self::new(parameters)
    }

    pub fn parameters(&self) -> &DhParameters {
        &self.parameters
    }

    fn exponent_bits(&self) -> u64 {
        PRIVATE_EXPONENT_BITS.min(self.parameters.prime().bits() - 2)
    }
}

impl KeyAgreement for ClassicalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Classical
    }

    fn generate_key_pair(&self) -> Result<KeyPair, AgreementError> {
        let bits = self.exponent_bits();
        let prime = self.parameters.prime();
        let generator = self.parameters.generator();

        // Force the top bit so the exponent has full length
        let exponent = OsRng.gen_biguint(bits) | (BigUint::one() << (bits - 1));
        let public = generator.modpow(&exponent, prime);

        let handle = encode_group_value(prime, generator, &exponent)
            .map_err(|_| AgreementError::InvalidPrivateKey)?;
        let public = encode_group_value(prime, generator, &public)
            .map_err(|e| AgreementError::InvalidPeerKey(e.to_string()))?;
        Ok(KeyPair {
            private_key: PrivateKey::from_bytes(handle),
            public_key: PublicKey::from_bytes(public),
        })
    }

    fn derive_shared_secret(
        &self,
        private_key: &PrivateKey,
        peer_public_key: &PublicKey,
    ) -> Result<SharedSecret, AgreementError> {
        let (parameters, exponent) = decode_private_key(private_key)?;
        let (peer_parameters, peer) = decode_public_key(peer_public_key)?;
        if parameters != self.parameters || peer_parameters != self.parameters {
            return Err(AgreementError::ParameterMismatch);
        }

        let prime = parameters.prime();
        let upper = prime - 2u32;
        if peer < BigUint::from(2u32) || peer > upper {
            return Err(AgreementError::InvalidPeerKey(
                "value outside [2, p-2]".to_string(),
            ));
        }

        let shared = peer.modpow(&exponent, prime);
        if shared <= BigUint::one() {
            return Err(AgreementError::InvalidPeerKey(
                "degenerate shared value".to_string(),
            ));
        }

        // Left-pad to the modulus length so both sides hash identical bytes
        let raw = shared.to_bytes_be();
        let mut padded = vec![0u8; parameters.modulus_len() - raw.len()];
        padded.extend_from_slice(&raw);

        Ok(SharedSecret::derive(&padded))
    }
}

fn decode_private_key(private_key: &PrivateKey) -> Result<(DhParameters, BigUint), AgreementError> {
    let (prime, generator, exponent) =
        decode_group_value(private_key.as_bytes()).map_err(|_| AgreementError::InvalidPrivateKey)?;
    Ok((DhParameters::new(prime, generator), exponent))
}

fn decode_public_key(public_key: &PublicKey) -> Result<(DhParameters, BigUint), AgreementError> {
    let (prime, generator, value) = decode_group_value(public_key.as_bytes())
        .map_err(|e| AgreementError::InvalidPeerKey(e.to_string()))?;
    Ok((DhParameters::new(prime, generator), value))
}
