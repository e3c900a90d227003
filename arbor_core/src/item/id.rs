// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Item identity types.

use core::fmt;

/// Sentinel value indicating "no item" in index fields.
pub const INVALID: u32 = u32::MAX;

/// A handle to an item in an [`ItemTree`](super::ItemTree).
///
/// Contains both a slot index and a generation counter so that stale handles
/// can be detected after an item is destroyed and the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl ItemId {
    /// Returns the raw slot index (for diagnostics and per-slot side tables).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({}@gen{})", self.idx, self.generation)
    }
}
