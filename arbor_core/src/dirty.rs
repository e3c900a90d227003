// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-state bookkeeping.
//!
//! Two independent mechanisms live here:
//!
//! - **Per-item dirty attributes**: a [`DirtyFlags`] bitmask per item plus a
//!   [`DirtyList`] threading every queued item. Item mutators OR flags into
//!   the mask and queue the item; the sync engine drains the whole list once
//!   per frame through [`ItemTree::drain_dirty`](crate::item::ItemTree::drain_dirty).
//!
//! - **Inherited-state channels**: [`EFFECTIVE_VISIBLE`],
//!   [`EFFECTIVE_ENABLED`] and [`SCENE_TRANSFORM`] are
//!   [`understory_dirty`] channels with child→parent dependency edges and
//!   eager propagation. They drive the lazy recomputation performed by
//!   [`ItemTree::refresh_inherited`](crate::item::ItemTree::refresh_inherited)
//!   and never reach the render side.

use alloc::vec::Vec;

use bitflags::bitflags;
use understory_dirty::Channel;

use crate::item::INVALID;

bitflags! {
    /// Categories of pending change on an item.
    ///
    /// The composite masks (`*_UPDATE_MASK`) name the sets of flags that
    /// trigger each reconciliation step.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DirtyFlags: u32 {
        /// Transform origin moved.
        const TRANSFORM_ORIGIN = 1 << 0;
        /// Custom transform list changed.
        const TRANSFORM = 1 << 1;
        /// Scale or rotation changed.
        const BASIC_TRANSFORM = 1 << 2;
        /// Position changed.
        const POSITION = 1 << 3;
        /// Size changed.
        const SIZE = 1 << 4;
        /// Stacking value changed.
        const Z_VALUE = 1 << 5;
        /// Paintable content must be regenerated.
        const CONTENT = 1 << 6;
        /// Smooth-scaling hint changed.
        const SMOOTH = 1 << 7;
        /// Opacity changed.
        const OPACITY_VALUE = 1 << 8;
        /// A child was added or removed.
        const CHILDREN_CHANGED = 1 << 9;
        /// A child's stacking (z or visibility) changed.
        const CHILDREN_STACKING_CHANGED = 1 << 10;
        /// The item moved to a different parent.
        const PARENT_CHANGED = 1 << 11;
        /// Clip flag changed.
        const CLIP = 1 << 12;
        /// The item entered the window or its nodes were invalidated.
        const WINDOW = 1 << 13;
        /// Effect reference count crossed zero.
        const EFFECT_REFERENCE = 1 << 14;
        /// Explicit visibility changed.
        const VISIBLE = 1 << 15;
        /// Hide reference count crossed zero.
        const HIDE_REFERENCE = 1 << 16;
        /// Antialiasing hint changed.
        const ANTIALIASING = 1 << 17;

        /// Flags that require the item's transform matrix to be rebuilt.
        const TRANSFORM_UPDATE_MASK = Self::TRANSFORM_ORIGIN.bits()
            | Self::TRANSFORM.bits()
            | Self::BASIC_TRANSFORM.bits()
            | Self::POSITION.bits()
            | Self::WINDOW.bits();
        /// Flags that require the paint node to be regenerated.
        const CONTENT_UPDATE_MASK = Self::SIZE.bits()
            | Self::CONTENT.bits()
            | Self::SMOOTH.bits()
            | Self::WINDOW.bits()
            | Self::ANTIALIASING.bits();
        /// Flags that require the child node list to be reconciled.
        const CHILDREN_UPDATE_MASK = Self::CHILDREN_CHANGED.bits()
            | Self::CHILDREN_STACKING_CHANGED.bits()
            | Self::EFFECT_REFERENCE.bits()
            | Self::WINDOW.bits();
        /// Flags that require the effective opacity to be recomputed.
        const OPACITY_UPDATE_MASK = Self::OPACITY_VALUE.bits()
            | Self::VISIBLE.bits()
            | Self::HIDE_REFERENCE.bits()
            | Self::WINDOW.bits();
    }
}

/// Effective visibility changed: explicit visibility ANDed down the ancestry.
pub const EFFECTIVE_VISIBLE: Channel = Channel::new(0);

/// Effective enabled state changed: explicit enabled ANDed down the ancestry.
pub const EFFECTIVE_ENABLED: Channel = Channel::new(1);

/// Item-to-scene mapping changed; requires re-multiplying ancestor matrices.
pub const SCENE_TRANSFORM: Channel = Channel::new(2);

/// One entry of a drained dirty list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyEntry {
    /// The drained item.
    pub item: crate::item::ItemId,
    /// The flags accumulated since the item was queued.
    pub flags: DirtyFlags,
}

/// Intrusive doubly-linked list of queued item slots.
///
/// Links are stored in parallel arrays indexed by item slot, so membership is
/// index-based: the list never owns items and items never own list nodes.
/// Insertion is at the head and is a no-op for a slot that is already linked.
#[derive(Debug, Default)]
pub struct DirtyList {
    head: u32,
    next: Vec<u32>,
    prev: Vec<u32>,
    linked: Vec<bool>,
    len: usize,
}

impl DirtyList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: INVALID,
            next: Vec::new(),
            prev: Vec::new(),
            linked: Vec::new(),
            len: 0,
        }
    }

    /// Number of queued slots.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether no slot is queued.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `idx` is currently linked.
    #[must_use]
    pub fn contains(&self, idx: u32) -> bool {
        self.linked.get(idx as usize).copied().unwrap_or(false)
    }

    /// Links `idx` at the head. Returns `false` if it was already linked.
    pub fn push_front(&mut self, idx: u32) -> bool {
        self.reserve_slot(idx);
        if self.linked[idx as usize] {
            return false;
        }
        let old_head = self.head;
        self.next[idx as usize] = old_head;
        self.prev[idx as usize] = INVALID;
        if old_head != INVALID {
            self.prev[old_head as usize] = idx;
        }
        self.head = idx;
        self.linked[idx as usize] = true;
        self.len += 1;
        true
    }

    /// Unlinks `idx`. Returns `false` if it was not linked.
    pub fn remove(&mut self, idx: u32) -> bool {
        if !self.contains(idx) {
            return false;
        }
        let prev = self.prev[idx as usize];
        let next = self.next[idx as usize];
        if prev != INVALID {
            self.next[prev as usize] = next;
        } else {
            self.head = next;
        }
        if next != INVALID {
            self.prev[next as usize] = prev;
        }
        self.next[idx as usize] = INVALID;
        self.prev[idx as usize] = INVALID;
        self.linked[idx as usize] = false;
        self.len -= 1;
        true
    }

    /// Detaches the whole list and returns its slots in head-to-tail order.
    ///
    /// Every slot is unlinked before this returns, so anything queued
    /// afterwards starts a fresh list.
    pub fn take_all(&mut self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while cursor != INVALID {
            out.push(cursor);
            let next = self.next[cursor as usize];
            self.next[cursor as usize] = INVALID;
            self.prev[cursor as usize] = INVALID;
            self.linked[cursor as usize] = false;
            cursor = next;
        }
        self.head = INVALID;
        self.len = 0;
        out
    }

    fn reserve_slot(&mut self, idx: u32) {
        let needed = idx as usize + 1;
        if self.linked.len() < needed {
            self.next.resize(needed, INVALID);
            self.prev.resize(needed, INVALID);
            self.linked.resize(needed, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn push_front_is_idempotent() {
        let mut list = DirtyList::new();
        assert!(list.push_front(3));
        assert!(!list.push_front(3));
        assert_eq!(list.len(), 1);
        assert_eq!(list.take_all(), vec![3]);
    }

    #[test]
    fn take_all_returns_head_first() {
        let mut list = DirtyList::new();
        list.push_front(0);
        list.push_front(1);
        list.push_front(2);
        assert_eq!(list.take_all(), vec![2, 1, 0]);
        assert!(list.is_empty());
        assert!(!list.contains(1));
    }

    #[test]
    fn remove_middle_keeps_links() {
        let mut list = DirtyList::new();
        list.push_front(0);
        list.push_front(1);
        list.push_front(2);
        assert!(list.remove(1));
        assert!(!list.remove(1));
        assert_eq!(list.take_all(), vec![2, 0]);
    }

    #[test]
    fn requeue_after_take_starts_fresh_list() {
        let mut list = DirtyList::new();
        list.push_front(5);
        let first = list.take_all();
        assert!(list.push_front(5), "slot must be linkable again");
        assert_eq!(first, vec![5]);
        assert_eq!(list.take_all(), vec![5]);
    }

    #[test]
    fn masks_cover_window() {
        for mask in [
            DirtyFlags::TRANSFORM_UPDATE_MASK,
            DirtyFlags::CONTENT_UPDATE_MASK,
            DirtyFlags::CHILDREN_UPDATE_MASK,
            DirtyFlags::OPACITY_UPDATE_MASK,
        ] {
            assert!(mask.contains(DirtyFlags::WINDOW), "{mask:?}");
        }
    }
}
