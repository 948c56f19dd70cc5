// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Classical Diffie-Hellman Domain Parameters
//!
//! Parameters travel as OpenSSL-compatible PKCS#3 blocks: a PEM
//! `DH PARAMETERS` armor around DER `SEQUENCE { p INTEGER, g INTEGER }`.
//! Raw DER is accepted as well.

use glass_pumpkin::safe_prime;
use num_bigint::BigUint;
use pem::{EncodeConfig, LineEnding, Pem};

use super::asn1::{decode_parameters, encode_parameters};
use super::AgreementError;

const PEM_LABEL: &str = "DH PARAMETERS";

/// Smallest modulus the classical backend will agree over.
pub const MIN_MODULUS_BITS: u64 = 512;

/// RFC 3526 group 14, the 2048-bit MODP prime.
const RFC3526_MODP_2048_PRIME: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9",
    "DE2BCBF6955817183995497CEA956AE515D2261898FA0510",
    "15728E5A8AACAA68FFFFFFFFFFFFFFFF",
);

/// Prime modulus and generator of a finite-field Diffie-Hellman group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhParameters {
    prime: BigUint,
    generator: BigUint,
}

impl DhParameters {
    /// Creates parameters from a prime and generator without validating them.
    pub fn new(prime: BigUint, generator: BigUint) -> Self {
        DhParameters { prime, generator }
    }

    /// The RFC 3526 2048-bit MODP group with generator 2.
    pub fn rfc3526_modp_2048() -> Self {
        let prime = BigUint::parse_bytes(RFC3526_MODP_2048_PRIME.as_bytes(), 16)
            .unwrap_or_default();
        DhParameters {
            prime,
            generator: BigUint::from(2u32),
        }
    }

    /// Decodes parameters from PEM text or raw DER.
    ///
    /// Only structure is checked here; use [`DhParameters::validate`]
    /// before agreeing over them.
    pub fn from_encoded(encoded: &[u8]) -> Result<Self, AgreementError> {
        if !encoded.trim_ascii_start().starts_with(b"-----BEGIN") {
            return Self::from_der(encoded);
        }

        let block = pem::parse(encoded)
            .map_err(|e| AgreementError::MalformedParameters(e.to_string()))?;
        if block.tag() != PEM_LABEL {
            return Err(AgreementError::MalformedParameters(format!(
                "expected {} block, found {}",
                PEM_LABEL,
                block.tag()
            )));
        }
        Self::from_der(block.contents())
    }

    /// Decodes a DER `DHParameter` structure.
    ///
    /// An optional trailing `privateValueLength` is accepted and ignored.
    pub fn from_der(der: &[u8]) -> Result<Self, AgreementError> {
        let (prime, generator) =
            decode_parameters(der).map_err(|e| AgreementError::MalformedParameters(e.to_string()))?;
        Ok(DhParameters { prime, generator })
    }

    /// Encodes as a DER `DHParameter` structure.
    pub fn to_der(&self) -> Result<Vec<u8>, AgreementError> {
        encode_parameters(&self.prime, &self.generator)
            .map_err(|e| AgreementError::MalformedParameters(e.to_string()))
    }

    /// Encodes as an OpenSSL-style PEM block.
    pub fn to_pem(&self) -> Result<String, AgreementError> {
        let block = Pem::new(PEM_LABEL, self.to_der()?);
        let config = EncodeConfig::new().set_line_ending(LineEnding::LF);
        Ok(pem::encode_config(&block, config))
    }

    /// Checks the parameters are usable for key agreement.
    ///
    /// The modulus must be a safe prime of at least [`MIN_MODULUS_BITS`]
    /// and the generator must lie in `[2, p-2]`.
    pub fn validate(&self) -> Result<(), AgreementError> {
        let bits = self.prime.bits();
        if bits < MIN_MODULUS_BITS {
            return Err(AgreementError::MalformedParameters(format!(
                "modulus has {} bits, at least {} required",
                bits, MIN_MODULUS_BITS
            )));
        }
        if !self.prime.bit(0) {
            return Err(AgreementError::MalformedParameters(
                "modulus is even".to_string(),
            ));
        }
        let two = BigUint::from(2u32);
        if self.generator < two || self.generator > &self.prime - &two {
            return Err(AgreementError::MalformedParameters(
                "generator outside [2, p-2]".to_string(),
            ));
        }
        // Most expensive check last
        if !safe_prime::check(&self.prime) {
            return Err(AgreementError::MalformedParameters(
                "modulus is not a safe prime".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the prime modulus.
    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    /// Returns the generator.
    pub fn generator(&self) -> &BigUint {
        &self.generator
    }

    /// Returns the modulus length in bytes.
    pub fn modulus_len(&self) -> usize {
        self.prime.bits().div_ceil(8) as usize
    }
}
