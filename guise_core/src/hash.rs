// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Name hashing for ids, layers, textures, and other registry keys.

use core::fmt;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// A 64-bit hash of a name (FNV-1a).
///
/// Every registry in a [`Scene`](crate::scene::Scene) is keyed by `NameHash`,
/// and node ids are stored as hashes rather than strings.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NameHash(pub u64);

impl NameHash {
    /// The hash of the empty string, used for the default layer and layout.
    pub const EMPTY: Self = Self::of("");

    /// Hashes `name`.
    #[must_use]
    pub const fn of(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut h = FNV_OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            h ^= bytes[i] as u64;
            h = h.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        Self(h)
    }

    /// Returns `true` for the hash of the empty string.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == Self::EMPTY.0
    }
}

impl fmt::Debug for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameHash({:#018x})", self.0)
    }
}

impl From<&str> for NameHash {
    fn from(name: &str) -> Self {
        Self::of(name)
    }
}
