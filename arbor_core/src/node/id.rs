// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render-node identity types.

use core::fmt;

/// A handle to a node in a [`NodeGraph`](super::NodeGraph).
///
/// Node handles stay valid for as long as the node lives, so renderers may
/// key per-node GPU state on them across frames.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Returns the raw slot index (for diagnostics only).
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

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}@gen{})", self.idx, self.generation)
    }
}

/// An opaque reference to paintable content owned by an item delegate.
///
/// The core never interprets the key; renderers use it to look up the
/// geometry, texture or glyph run that the delegate registered elsewhere.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentKey(pub u64);

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey({})", self.0)
    }
}
