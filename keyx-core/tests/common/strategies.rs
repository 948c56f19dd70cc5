// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Proptest Strategies

use proptest::prelude::*;

/// Identities as handed out by an upstream auth provider.
pub fn identity_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}"
}

/// Two distinct identities.
pub fn identity_pair_strategy() -> impl Strategy<Value = (String, String)> {
    (identity_strategy(), identity_strategy()).prop_filter("distinct", |(a, b)| a != b)
}

/// Arbitrary binary payloads, including empty.
pub fn bytes_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}
