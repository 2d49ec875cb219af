// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Random short-link aliases.

use rand::Rng;

/// Alias alphabet. Omits `i`, `o`, `I`, `O`, `0` and `1`, which are easy to
/// misread.
pub const ALPHABET: &[u8] = b"abcdefghjklmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// A random alias of `length` characters from [`ALPHABET`].
pub fn random_alias(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
