// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Text encoding for keys and secrets.
//!
//! Standard alphabet, padded, strict: non-canonical trailing bits and
//! missing padding are rejected so every byte string has exactly one
//! accepted text form.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::AgreementError;

/// Encodes bytes as padded standard base64.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes padded standard base64.
pub fn decode(text: &str) -> Result<Vec<u8>, AgreementError> {
    STANDARD
        .decode(text)
        .map_err(|_| AgreementError::InvalidEncoding)
}
