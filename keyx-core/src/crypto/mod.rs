// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod encryption;

pub use encryption::{
    decrypt, decrypt_with_aad, encrypt, encrypt_with_aad, EncryptionError, SymmetricKey,
};
