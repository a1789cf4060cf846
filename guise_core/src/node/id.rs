// Copyright 2026 the Guise Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node identity.

use core::fmt;

/// Sentinel value indicating "no node" in index fields.
pub const INVALID: u16 = u16::MAX;

/// A handle to a node in a [`NodeStore`](super::NodeStore).
///
/// Packs a 16-bit generation above a 16-bit slot index. Deleting a node bumps
/// the slot's generation, so handles taken before the delete stop validating
/// even after the slot is reused. Generations skip zero, which makes the zero
/// handle permanently invalid.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeHandle(pub(crate) u32);

impl NodeHandle {
    /// A handle that never refers to a live node.
    pub const NONE: Self = Self(0);

    #[inline]
    pub(crate) const fn new(index: u16, generation: u16) -> Self {
        Self(((generation as u32) << 16) | index as u32)
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "handle halves are 16 bits by construction"
    )]
    pub const fn index(self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "handle halves are 16 bits by construction"
    )]
    pub const fn generation(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Returns the packed 32-bit value.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Rebuilds a handle from [`to_bits`](Self::to_bits).
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({}@gen{})", self.index(), self.generation())
    }
}

/// Returns the generation that follows `generation`, skipping zero.
#[inline]
pub(crate) const fn next_generation(generation: u16) -> u16 {
    match generation.wrapping_add(1) {
        0 => 1,
        g => g,
    }
}
