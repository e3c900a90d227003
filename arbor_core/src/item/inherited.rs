// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lazily recomputed inherited state.
//!
//! Effective visibility, effective enabled state and the item-to-scene
//! transform all depend on the ancestor chain. Mutators only mark the
//! corresponding [`dirty`](crate::dirty) channel, with eager propagation along
//! child→parent dependency edges; [`ItemTree::refresh_inherited`] drains each
//! channel in parent-before-child order and recomputes:
//!
//! 1. **`EFFECTIVE_VISIBLE`**: `parent_effective && visible`.
//! 2. **`EFFECTIVE_ENABLED`**: `parent_effective && enabled`.
//! 3. **`SCENE_TRANSFORM`**: `parent_scene * local_matrix`.
//!
//! None of this reaches the render side; node matrices are local and the
//! renderer accumulates them itself. The results serve hit testing and focus
//! handling on the GUI side.

use alloc::vec::Vec;

use kurbo::{Affine, Point};

use super::id::{INVALID, ItemId};
use super::store::ItemTree;
use crate::dirty;

/// Items whose inherited state changed in one
/// [`refresh_inherited`](ItemTree::refresh_inherited) call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InheritedChanges {
    /// Items whose effective visibility flipped.
    pub visibility: Vec<ItemId>,
    /// Items whose effective enabled state flipped.
    pub enabled: Vec<ItemId>,
    /// Items whose item-to-scene transform was recomputed.
    pub transforms: Vec<ItemId>,
}

impl InheritedChanges {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visibility.is_empty() && self.enabled.is_empty() && self.transforms.is_empty()
    }
}

impl ItemTree {
    /// Recomputes every stale inherited value.
    pub fn refresh_inherited(&mut self) -> InheritedChanges {
        let mut changes = InheritedChanges::default();

        let dirty_visible: Vec<u32> = self
            .inherited
            .drain(dirty::EFFECTIVE_VISIBLE)
            .affected()
            .deterministic()
            .run()
            .collect();
        for idx in dirty_visible {
            let id = self.handle(idx);
            if !self.is_alive(id) {
                continue;
            }
            let p = self.parent[idx as usize];
            let parent_visible = p == INVALID || self.effective_visible[p as usize];
            let new = parent_visible && self.is_visible(id);
            if self.effective_visible[idx as usize] != new {
                self.effective_visible[idx as usize] = new;
                changes.visibility.push(id);
            }
        }

        let dirty_enabled: Vec<u32> = self
            .inherited
            .drain(dirty::EFFECTIVE_ENABLED)
            .affected()
            .deterministic()
            .run()
            .collect();
        for idx in dirty_enabled {
            let id = self.handle(idx);
            if !self.is_alive(id) {
                continue;
            }
            let p = self.parent[idx as usize];
            let parent_enabled = p == INVALID || self.effective_enabled[p as usize];
            let new = parent_enabled && self.is_enabled(id);
            if self.effective_enabled[idx as usize] != new {
                self.effective_enabled[idx as usize] = new;
                changes.enabled.push(id);
            }
        }

        let dirty_transforms: Vec<u32> = self
            .inherited
            .drain(dirty::SCENE_TRANSFORM)
            .affected()
            .deterministic()
            .run()
            .collect();
        for idx in dirty_transforms {
            let id = self.handle(idx);
            if !self.is_alive(id) {
                continue;
            }
            let p = self.parent[idx as usize];
            let parent_scene = if p == INVALID {
                Affine::IDENTITY
            } else {
                self.scene_transform[p as usize]
            };
            self.scene_transform[idx as usize] = parent_scene * self.local_matrix(id).to_affine();
            changes.transforms.push(id);
        }

        changes
    }

    /// Whether the item and all its ancestors are visible.
    ///
    /// Only valid after [`refresh_inherited`](Self::refresh_inherited).
    #[must_use]
    pub fn effective_visible(&self, id: ItemId) -> bool {
        self.validate(id);
        self.effective_visible[id.idx as usize]
    }

    /// Whether the item and all its ancestors are enabled.
    ///
    /// Only valid after [`refresh_inherited`](Self::refresh_inherited).
    #[must_use]
    pub fn effective_enabled(&self, id: ItemId) -> bool {
        self.validate(id);
        self.effective_enabled[id.idx as usize]
    }

    /// Item-to-scene transform.
    ///
    /// Only valid after [`refresh_inherited`](Self::refresh_inherited).
    #[must_use]
    pub fn scene_transform(&self, id: ItemId) -> Affine {
        self.validate(id);
        self.scene_transform[id.idx as usize]
    }

    /// Maps a point from item coordinates to scene coordinates.
    #[must_use]
    pub fn map_to_scene(&self, id: ItemId, local: Point) -> Point {
        self.scene_transform(id) * local
    }

    /// Maps a point from scene coordinates to item coordinates.
    ///
    /// Returns `None` when the item's transform is singular (for example a
    /// zero scale).
    #[must_use]
    pub fn map_from_scene(&self, id: ItemId, scene: Point) -> Option<Point> {
        let t = self.scene_transform(id);
        if t.determinant().abs() <= f64::EPSILON {
            return None;
        }
        Some(t.inverse() * scene)
    }
}
