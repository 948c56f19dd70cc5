// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Key Agreement Error Types

use thiserror::Error;

/// Errors that can occur while generating keys or deriving secrets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgreementError {
    #[error("Invalid peer public key: {0}")]
    InvalidPeerKey(String),

    #[error("Malformed Diffie-Hellman parameters: {0}")]
    MalformedParameters(String),

    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Private key was generated under different Diffie-Hellman parameters")]
    ParameterMismatch,

    #[error("Invalid base64 encoding")]
    InvalidEncoding,
}
