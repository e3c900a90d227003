// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use super::id::{INVALID, ItemId};
use super::store::ItemTree;

/// An iterator over the direct children of an item, in insertion order.
///
/// Created by [`ItemTree::children`].
#[derive(Debug)]
pub struct Children<'a> {
    tree: &'a ItemTree,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(tree: &'a ItemTree, first: u32) -> Self {
        Self {
            tree,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = ItemId;

    fn next(&mut self) -> Option<ItemId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.tree.next_sibling[idx as usize];
        Some(self.tree.handle(idx))
    }
}

/// An iterator from an item up to the root, starting with the item itself.
///
/// Created by [`ItemTree::ancestors`].
#[derive(Debug)]
pub struct Ancestors<'a> {
    tree: &'a ItemTree,
    current: u32,
}

impl Iterator for Ancestors<'_> {
    type Item = ItemId;

    fn next(&mut self) -> Option<ItemId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.tree.parent[idx as usize];
        Some(self.tree.handle(idx))
    }
}

impl ItemTree {
    /// Returns an iterator over `id` and its ancestors, innermost first.
    #[must_use]
    pub fn ancestors(&self, id: ItemId) -> Ancestors<'_> {
        self.validate(id);
        Ancestors {
            tree: self,
            current: id.idx,
        }
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor_of(&self, ancestor: ItemId, id: ItemId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }
}
