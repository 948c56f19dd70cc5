// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! DER structures for classical Diffie-Hellman.

use der::asn1::UintRef;
use der::{Decode, Encode, Sequence};
use num_bigint::BigUint;

/// PKCS#3 `DHParameter`.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub(crate) struct DhParameter<'a> {
    pub prime: UintRef<'a>,
    pub base: UintRef<'a>,
    #[asn1(optional = "true")]
    pub private_value_length: Option<u32>,
}

/// A group together with one element or exponent in it.
///
/// Public keys carry the sender's group this way, and private key
/// handles keep the group they were generated under.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub(crate) struct GroupValue<'a> {
    pub prime: UintRef<'a>,
    pub base: UintRef<'a>,
    pub value: UintRef<'a>,
}

fn to_uint(bytes: &[u8]) -> der::Result<UintRef<'_>> {
    UintRef::new(bytes)
}

fn from_uint(value: UintRef<'_>) -> BigUint {
    BigUint::from_bytes_be(value.as_bytes())
}

pub(crate) fn encode_parameters(prime: &BigUint, base: &BigUint) -> der::Result<Vec<u8>> {
    let prime = prime.to_bytes_be();
    let base = base.to_bytes_be();
    DhParameter {
        prime: to_uint(&prime)?,
        base: to_uint(&base)?,
        private_value_length: None,
    }
    .to_der()
}

/// Returns `(p, g)`; a trailing `privateValueLength` is dropped.
pub(crate) fn decode_parameters(bytes: &[u8]) -> der::Result<(BigUint, BigUint)> {
    let parameter = DhParameter::from_der(bytes)?;
    Ok((from_uint(parameter.prime), from_uint(parameter.base)))
}

pub(crate) fn encode_group_value(
    prime: &BigUint,
    base: &BigUint,
    value: &BigUint,
) -> der::Result<Vec<u8>> {
    let prime = prime.to_bytes_be();
    let base = base.to_bytes_be();
    let value = value.to_bytes_be();
    GroupValue {
        prime: to_uint(&prime)?,
        base: to_uint(&base)?,
        value: to_uint(&value)?,
    }
    .to_der()
}

/// Returns `(p, g, value)`.
pub(crate) fn decode_group_value(bytes: &[u8]) -> der::Result<(BigUint, BigUint, BigUint)> {
    let group_value = GroupValue::from_der(bytes)?;
    Ok((
        from_uint(group_value.prime),
        from_uint(group_value.base),
        from_uint(group_value.value),
    ))
}
