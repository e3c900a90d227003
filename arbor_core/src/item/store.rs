// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays item storage with allocation, topology, and property management.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;

use bitflags::bitflags;
use kurbo::{Affine, Point, Rect, Size};
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use super::delegate::{ItemContext, ItemDelegate};
use super::id::{INVALID, ItemId};
use super::traverse::Children;
use crate::dirty::{self, DirtyEntry, DirtyFlags, DirtyList};
use crate::transform::Transform3d;

bitflags! {
    /// Role bits of an item.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ItemFlags: u8 {
        /// The item draws something and gets a paint node.
        const HAS_CONTENTS = 1 << 0;
        /// The item remembers which descendant last had focus.
        const IS_FOCUS_SCOPE = 1 << 1;
        /// The item acts as a viewport for its descendants.
        const IS_VIEWPORT = 1 << 2;
        /// The item takes part in pointer hit testing.
        const ACCEPTS_POINTER = 1 << 3;
        /// The item receives hover enter/leave notifications.
        const ACCEPTS_HOVER = 1 << 4;
    }
}

/// Fixed point about which scale and rotation are applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransformOrigin {
    /// Top-left corner.
    TopLeft,
    /// Middle of the top edge.
    Top,
    /// Top-right corner.
    TopRight,
    /// Middle of the left edge.
    Left,
    /// Center of the item.
    #[default]
    Center,
    /// Middle of the right edge.
    Right,
    /// Bottom-left corner.
    BottomLeft,
    /// Middle of the bottom edge.
    Bottom,
    /// Bottom-right corner.
    BottomRight,
}

impl TransformOrigin {
    /// Returns the origin point for an item of the given size.
    #[must_use]
    pub fn point(self, size: Size) -> Point {
        let (w, h) = (size.width, size.height);
        match self {
            Self::TopLeft => Point::new(0.0, 0.0),
            Self::Top => Point::new(w / 2.0, 0.0),
            Self::TopRight => Point::new(w, 0.0),
            Self::Left => Point::new(0.0, h / 2.0),
            Self::Center => Point::new(w / 2.0, h / 2.0),
            Self::Right => Point::new(w, h / 2.0),
            Self::BottomLeft => Point::new(0.0, h),
            Self::Bottom => Point::new(w / 2.0, h),
            Self::BottomRight => Point::new(w, h),
        }
    }
}

/// Struct-of-arrays storage for all items of one window.
///
/// Items are addressed by [`ItemId`] handles. Each tree owns one *content
/// root* item, created with the tree; an item is part of the window exactly
/// when the root is among its ancestors. Only those items are queued for
/// sync.
pub struct ItemTree {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,
    root: u32,

    // -- Geometry --
    position: Vec<Point>,
    size: Vec<Size>,
    implicit_size: Vec<Size>,
    explicit_size: Vec<bool>,
    z: Vec<f64>,
    scale: Vec<f64>,
    rotation: Vec<f64>,
    origin: Vec<TransformOrigin>,
    transforms: Vec<Vec<Transform3d>>,

    // -- Appearance and state --
    opacity: Vec<f64>,
    visible: Vec<bool>,
    enabled: Vec<bool>,
    clip: Vec<bool>,
    smooth: Vec<bool>,
    antialiasing: Vec<bool>,
    flags: Vec<ItemFlags>,
    effect_refs: Vec<u32>,
    hide_refs: Vec<u32>,
    delegate: Vec<Option<Box<dyn ItemDelegate>>>,

    // -- Computed by refresh_inherited --
    pub(crate) effective_visible: Vec<bool>,
    pub(crate) effective_enabled: Vec<bool>,
    pub(crate) scene_transform: Vec<Affine>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    alive: Vec<bool>,
    free_list: Vec<u32>,
    live: usize,

    // -- Dirty tracking --
    dirty_attrs: Vec<DirtyFlags>,
    dirty_list: DirtyList,
    in_window: Vec<bool>,
    pub(crate) inherited: DirtyTracker<u32>,

    // -- Polish --
    pub(crate) polish_scheduled: Vec<bool>,
    pub(crate) polish_queue: Vec<u32>,

    // -- Items whose render nodes must be released on the next sync --
    released: Vec<ItemId>,
}

impl fmt::Debug for ItemTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemTree")
            .field("live", &self.live)
            .field("root", &self.root())
            .field("dirty", &self.dirty_list.len())
            .field("polish_queue", &self.polish_queue.len())
            .field("released", &self.released.len())
            .finish_non_exhaustive()
    }
}

impl Default for ItemTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemTree {
    /// Creates a tree holding only the content root item.
    ///
    /// The root is part of the window from the start and is queued with
    /// [`WINDOW`](DirtyFlags::WINDOW) so that the first sync builds its node.
    #[must_use]
    pub fn new() -> Self {
        let mut tree = Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            root: INVALID,
            position: Vec::new(),
            size: Vec::new(),
            implicit_size: Vec::new(),
            explicit_size: Vec::new(),
            z: Vec::new(),
            scale: Vec::new(),
            rotation: Vec::new(),
            origin: Vec::new(),
            transforms: Vec::new(),
            opacity: Vec::new(),
            visible: Vec::new(),
            enabled: Vec::new(),
            clip: Vec::new(),
            smooth: Vec::new(),
            antialiasing: Vec::new(),
            flags: Vec::new(),
            effect_refs: Vec::new(),
            hide_refs: Vec::new(),
            delegate: Vec::new(),
            effective_visible: Vec::new(),
            effective_enabled: Vec::new(),
            scene_transform: Vec::new(),
            generation: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            dirty_attrs: Vec::new(),
            dirty_list: DirtyList::new(),
            in_window: Vec::new(),
            inherited: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            polish_scheduled: Vec::new(),
            polish_queue: Vec::new(),
            released: Vec::new(),
        };
        let root = tree.create_item();
        tree.root = root.idx;
        tree.in_window[root.idx as usize] = true;
        tree.mark(root.idx, DirtyFlags::WINDOW);
        tree
    }

    /// Returns the content root item.
    #[must_use]
    pub fn root(&self) -> ItemId {
        self.handle(self.root)
    }

    /// Number of live items, the root included.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Always `false`: the root item is never destroyed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    // -- Allocation API --

    /// Creates a detached item and returns its handle.
    ///
    /// The item starts at the origin with zero size, full opacity, visible,
    /// enabled, unclipped, with a centered transform origin, no flags and no
    /// delegate. It is not part of the window until attached below the root.
    pub fn create_item(&mut self) -> ItemId {
        let idx = if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.position[i] = Point::ZERO;
            self.size[i] = Size::ZERO;
            self.implicit_size[i] = Size::ZERO;
            self.explicit_size[i] = false;
            self.z[i] = 0.0;
            self.scale[i] = 1.0;
            self.rotation[i] = 0.0;
            self.origin[i] = TransformOrigin::default();
            self.transforms[i].clear();
            self.opacity[i] = 1.0;
            self.visible[i] = true;
            self.enabled[i] = true;
            self.clip[i] = false;
            self.smooth[i] = true;
            self.antialiasing[i] = false;
            self.flags[i] = ItemFlags::empty();
            self.effect_refs[i] = 0;
            self.hide_refs[i] = 0;
            self.delegate[i] = None;
            self.effective_visible[i] = true;
            self.effective_enabled[i] = true;
            self.scene_transform[i] = Affine::IDENTITY;
            self.alive[i] = true;
            self.dirty_attrs[i] = DirtyFlags::empty();
            self.in_window[i] = false;
            self.polish_scheduled[i] = false;
            idx
        } else {
            let idx = u32::try_from(self.alive.len()).unwrap_or(INVALID);
            assert!(idx != INVALID, "item tree exhausted");
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.position.push(Point::ZERO);
            self.size.push(Size::ZERO);
            self.implicit_size.push(Size::ZERO);
            self.explicit_size.push(false);
            self.z.push(0.0);
            self.scale.push(1.0);
            self.rotation.push(0.0);
            self.origin.push(TransformOrigin::default());
            self.transforms.push(Vec::new());
            self.opacity.push(1.0);
            self.visible.push(true);
            self.enabled.push(true);
            self.clip.push(false);
            self.smooth.push(true);
            self.antialiasing.push(false);
            self.flags.push(ItemFlags::empty());
            self.effect_refs.push(0);
            self.hide_refs.push(0);
            self.delegate.push(None);
            self.effective_visible.push(true);
            self.effective_enabled.push(true);
            self.scene_transform.push(Affine::IDENTITY);
            self.generation.push(0);
            self.alive.push(true);
            self.dirty_attrs.push(DirtyFlags::empty());
            self.in_window.push(false);
            self.polish_scheduled.push(false);
            idx
        };
        self.live += 1;
        self.mark_inherited(idx);
        self.handle(idx)
    }

    /// Creates a detached item driven by `delegate`.
    pub fn create_item_with(&mut self, delegate: Box<dyn ItemDelegate>) -> ItemId {
        let id = self.create_item();
        self.delegate[id.idx as usize] = Some(delegate);
        id
    }

    /// Installs or replaces the delegate of an item.
    ///
    /// Marks [`CONTENT`](DirtyFlags::CONTENT) so the new delegate gets to
    /// produce the paint node.
    pub fn set_delegate(&mut self, id: ItemId, delegate: Box<dyn ItemDelegate>) {
        self.validate(id);
        self.delegate[id.idx as usize] = Some(delegate);
        self.mark(id.idx, DirtyFlags::CONTENT);
    }

    /// Destroys an item and its whole subtree.
    ///
    /// Items that were part of the window have their render nodes queued for
    /// release on the next sync.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or refers to the root item.
    pub fn destroy_item(&mut self, id: ItemId) {
        self.validate(id);
        assert!(id.idx != self.root, "cannot destroy the root item");
        if self.parent[id.idx as usize] != INVALID {
            self.unlink_child(id.idx);
        }
        let mut subtree = Vec::new();
        self.collect_subtree(id.idx, &mut subtree);
        // Children before parents so dependency edges are removed leaf-first.
        for &idx in subtree.iter().rev() {
            let i = idx as usize;
            if self.in_window[i] {
                self.released.push(self.handle(idx));
                self.in_window[i] = false;
            }
            self.dirty_list.remove(idx);
            self.polish_queue.retain(|&q| q != idx);
            self.inherited.remove_key(idx);
            self.delegate[i] = None;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.alive[i] = false;
            self.generation[i] = self.generation[i].wrapping_add(1);
            self.free_list.push(idx);
            self.live -= 1;
        }
    }

    /// Returns whether the given handle refers to a live item.
    #[must_use]
    pub fn is_alive(&self, id: ItemId) -> bool {
        (id.idx as usize) < self.alive.len()
            && self.alive[id.idx as usize]
            && self.generation[id.idx as usize] == id.generation
    }

    /// Returns whether the item is currently part of the window.
    #[must_use]
    pub fn in_window(&self, id: ItemId) -> bool {
        self.validate(id);
        self.in_window[id.idx as usize]
    }

    // -- Topology API --

    /// Adds `child` as the last child of `parent`.
    ///
    /// Marks [`CHILDREN_CHANGED`](DirtyFlags::CHILDREN_CHANGED) on `parent`.
    /// If `parent` is part of the window, the whole `child` subtree joins it.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, `child` already has a parent, or
    /// `child` is an ancestor of `parent`.
    pub fn add_child(&mut self, parent: ItemId, child: ItemId) {
        self.check_link(parent, child);
        self.link_child(parent.idx, child.idx, INVALID);
        self.after_link(parent.idx, child.idx, false);
    }

    /// Inserts `child` before `sibling` in the sibling list.
    ///
    /// # Panics
    ///
    /// Panics if handles are stale, `child` already has a parent, or `sibling`
    /// has no parent.
    pub fn insert_before(&mut self, child: ItemId, sibling: ItemId) {
        self.validate(sibling);
        let p = self.parent[sibling.idx as usize];
        assert!(p != INVALID, "sibling has no parent");
        let parent = self.handle(p);
        self.check_link(parent, child);
        self.link_child(p, child.idx, sibling.idx);
        self.after_link(p, child.idx, false);
    }

    /// Removes `child` from its current parent.
    ///
    /// If `child` was part of the window, its subtree leaves it: the items
    /// are dropped from the dirty list and the polish queue and their render
    /// nodes are released on the next sync.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the item has no parent.
    pub fn remove_from_parent(&mut self, child: ItemId) {
        self.validate(child);
        let c = child.idx;
        assert!(self.parent[c as usize] != INVALID, "item has no parent");
        self.unlink_child(c);
        if self.in_window[c as usize] {
            self.leave_window(c);
        }
        self.mark_inherited(c);
    }

    /// Moves `child` to the end of `new_parent`'s children.
    ///
    /// When the item stays inside the window its render nodes are kept, so
    /// the move costs one node reparent during sync.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale or `child` is an ancestor of
    /// `new_parent`.
    pub fn reparent(&mut self, child: ItemId, new_parent: ItemId) {
        self.validate(child);
        self.validate(new_parent);
        let c = child.idx;
        let was_in_window = self.in_window[c as usize];
        if self.parent[c as usize] != INVALID {
            self.unlink_child(c);
        }
        self.check_link(new_parent, child);
        self.link_child(new_parent.idx, c, INVALID);
        let now_in_window = self.in_window[new_parent.idx as usize];
        if was_in_window && !now_in_window {
            self.leave_window(c);
        }
        self.after_link(new_parent.idx, c, was_in_window);
    }

    /// Returns the parent of an item, if any.
    #[must_use]
    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        (p != INVALID).then(|| self.handle(p))
    }

    /// Returns an iterator over the direct children of an item, in insertion
    /// order.
    #[must_use]
    pub fn children(&self, id: ItemId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns the children of an item in paint order.
    ///
    /// Paint order is a stable sort by z: children with equal z keep their
    /// insertion order. A NaN z is treated as `0.0`. When every child has
    /// z = 0 the insertion order is returned without sorting, which is the
    /// same result the stable sort would produce.
    #[must_use]
    pub fn paint_order_children(&self, id: ItemId) -> Vec<ItemId> {
        let mut kids: Vec<ItemId> = self.children(id).collect();
        if kids.iter().all(|k| self.stacking_z(k.idx) == 0.0) {
            return kids;
        }
        kids.sort_by(|a, b| {
            self.stacking_z(a.idx)
                .partial_cmp(&self.stacking_z(b.idx))
                .unwrap_or(Ordering::Equal)
        });
        kids
    }

    // -- Property getters --

    /// Position of the item in its parent's coordinates.
    #[must_use]
    pub fn position(&self, id: ItemId) -> Point {
        self.validate(id);
        self.position[id.idx as usize]
    }

    /// Current size: the explicit size if one was set, else the implicit size.
    #[must_use]
    pub fn size(&self, id: ItemId) -> Size {
        self.validate(id);
        self.size[id.idx as usize]
    }

    /// Size the item would like to have when none is set explicitly.
    #[must_use]
    pub fn implicit_size(&self, id: ItemId) -> Size {
        self.validate(id);
        self.implicit_size[id.idx as usize]
    }

    /// `(0, 0, width, height)`.
    #[must_use]
    pub fn bounding_rect(&self, id: ItemId) -> Rect {
        Rect::from_origin_size(Point::ZERO, self.size(id))
    }

    /// Clip rectangle in the item's own coordinates.
    #[must_use]
    pub fn clip_rect(&self, id: ItemId) -> Rect {
        self.bounding_rect(id)
    }

    /// Stacking value among siblings.
    #[must_use]
    pub fn z(&self, id: ItemId) -> f64 {
        self.validate(id);
        self.z[id.idx as usize]
    }

    /// Uniform scale factor.
    #[must_use]
    pub fn scale(&self, id: ItemId) -> f64 {
        self.validate(id);
        self.scale[id.idx as usize]
    }

    /// Rotation in degrees, clockwise.
    #[must_use]
    pub fn rotation(&self, id: ItemId) -> f64 {
        self.validate(id);
        self.rotation[id.idx as usize]
    }

    /// Origin for scale and rotation.
    #[must_use]
    pub fn transform_origin(&self, id: ItemId) -> TransformOrigin {
        self.validate(id);
        self.origin[id.idx as usize]
    }

    /// Custom transforms, innermost first.
    #[must_use]
    pub fn transforms(&self, id: ItemId) -> &[Transform3d] {
        self.validate(id);
        &self.transforms[id.idx as usize]
    }

    /// Own opacity, not multiplied by ancestors.
    #[must_use]
    pub fn opacity(&self, id: ItemId) -> f64 {
        self.validate(id);
        self.opacity[id.idx as usize]
    }

    /// Explicit visibility.
    #[must_use]
    pub fn is_visible(&self, id: ItemId) -> bool {
        self.validate(id);
        self.visible[id.idx as usize]
    }

    /// Explicit enabled state.
    #[must_use]
    pub fn is_enabled(&self, id: ItemId) -> bool {
        self.validate(id);
        self.enabled[id.idx as usize]
    }

    /// Whether the item clips its contents and children.
    #[must_use]
    pub fn clip(&self, id: ItemId) -> bool {
        self.validate(id);
        self.clip[id.idx as usize]
    }

    /// Smooth-scaling hint.
    #[must_use]
    pub fn smooth(&self, id: ItemId) -> bool {
        self.validate(id);
        self.smooth[id.idx as usize]
    }

    /// Antialiasing hint.
    #[must_use]
    pub fn antialiasing(&self, id: ItemId) -> bool {
        self.validate(id);
        self.antialiasing[id.idx as usize]
    }

    /// Role flags.
    #[must_use]
    pub fn flags(&self, id: ItemId) -> ItemFlags {
        self.validate(id);
        self.flags[id.idx as usize]
    }

    /// Number of effects using this item as a source.
    #[must_use]
    pub fn effect_ref_count(&self, id: ItemId) -> u32 {
        self.validate(id);
        self.effect_refs[id.idx as usize]
    }

    /// Number of effects that hide this item while using it.
    #[must_use]
    pub fn hide_ref_count(&self, id: ItemId) -> u32 {
        self.validate(id);
        self.hide_refs[id.idx as usize]
    }

    /// Opacity the item contributes to its node chain: its own opacity when
    /// explicitly visible and not hidden by an effect, else zero.
    #[must_use]
    pub fn effective_opacity(&self, id: ItemId) -> f64 {
        self.validate(id);
        let i = id.idx as usize;
        if self.visible[i] && self.hide_refs[i] == 0 {
            self.opacity[i]
        } else {
            0.0
        }
    }

    /// Whether the item gets a node in its parent's child list: explicitly
    /// visible, or used by an effect.
    #[must_use]
    pub fn contributes_node(&self, id: ItemId) -> bool {
        self.validate(id);
        self.visible[id.idx as usize] || self.effect_refs[id.idx as usize] > 0
    }

    /// Item-to-parent matrix.
    ///
    /// `translate(x, y) × custom transforms × [origin, scale, rotate, -origin]`,
    /// where the custom transform list is applied innermost first and the
    /// bracketed part only exists when scale or rotation differ from
    /// identity.
    #[must_use]
    pub fn local_matrix(&self, id: ItemId) -> Transform3d {
        self.validate(id);
        let i = id.idx as usize;
        let pos = self.position[i];
        let mut m = Transform3d::from_translation(pos.x, pos.y, 0.0);
        for t in self.transforms[i].iter().rev() {
            m = m * *t;
        }
        let (scale, rotation) = (self.scale[i], self.rotation[i]);
        if scale != 1.0 || rotation != 0.0 {
            let o = self.origin[i].point(self.size[i]);
            m = m.then_translate_local(o.x, o.y);
            if scale != 1.0 {
                m = m * Transform3d::from_scale(scale, scale, 1.0);
            }
            if rotation != 0.0 {
                m = m * Transform3d::from_rotation_z_degrees(rotation);
            }
            m = m.then_translate_local(-o.x, -o.y);
        }
        m
    }

    /// Whether a [`SIZE`](DirtyFlags::SIZE) change moves the transform
    /// origin in a way that changes [`local_matrix`](Self::local_matrix).
    #[must_use]
    pub fn size_affects_transform(&self, id: ItemId) -> bool {
        self.validate(id);
        let i = id.idx as usize;
        self.origin[i] != TransformOrigin::TopLeft
            && (self.scale[i] != 1.0 || self.rotation[i] != 0.0)
    }

    // -- Mutation API (auto-marks dirty) --

    /// Moves the item within its parent.
    pub fn set_position(&mut self, id: ItemId, position: Point) {
        self.validate(id);
        let i = id.idx as usize;
        if self.position[i] == position {
            return;
        }
        let old = self.geometry(i);
        self.position[i] = position;
        self.mark(id.idx, DirtyFlags::POSITION);
        self.inherited
            .mark_with(id.idx, dirty::SCENE_TRANSFORM, &EagerPolicy);
        self.notify_geometry(id, old);
    }

    /// Sets an explicit size, overriding the implicit size.
    pub fn set_size(&mut self, id: ItemId, size: Size) {
        self.validate(id);
        self.explicit_size[id.idx as usize] = true;
        self.apply_size(id, size);
    }

    /// Sets the implicit size. The item's size follows it unless an explicit
    /// size was set.
    pub fn set_implicit_size(&mut self, id: ItemId, size: Size) {
        self.validate(id);
        let i = id.idx as usize;
        self.implicit_size[i] = size;
        if !self.explicit_size[i] {
            self.apply_size(id, size);
        }
    }

    /// Drops the explicit size so the item follows its implicit size again.
    pub fn reset_size(&mut self, id: ItemId) {
        self.validate(id);
        let i = id.idx as usize;
        self.explicit_size[i] = false;
        let implicit = self.implicit_size[i];
        self.apply_size(id, implicit);
    }

    /// Sets the stacking value. Marks the parent
    /// [`CHILDREN_STACKING_CHANGED`](DirtyFlags::CHILDREN_STACKING_CHANGED).
    pub fn set_z(&mut self, id: ItemId, z: f64) {
        self.validate(id);
        let i = id.idx as usize;
        if self.z[i] == z || (self.z[i].is_nan() && z.is_nan()) {
            return;
        }
        self.z[i] = z;
        self.mark(id.idx, DirtyFlags::Z_VALUE);
        self.mark_parent(id.idx, DirtyFlags::CHILDREN_STACKING_CHANGED);
    }

    /// Sets the uniform scale factor.
    pub fn set_scale(&mut self, id: ItemId, scale: f64) {
        self.validate(id);
        let i = id.idx as usize;
        if self.scale[i] == scale {
            return;
        }
        self.scale[i] = scale;
        self.mark_basic_transform(id.idx);
    }

    /// Sets the rotation, in degrees.
    pub fn set_rotation(&mut self, id: ItemId, degrees: f64) {
        self.validate(id);
        let i = id.idx as usize;
        if self.rotation[i] == degrees {
            return;
        }
        self.rotation[i] = degrees;
        self.mark_basic_transform(id.idx);
    }

    /// Sets the origin for scale and rotation.
    pub fn set_transform_origin(&mut self, id: ItemId, origin: TransformOrigin) {
        self.validate(id);
        let i = id.idx as usize;
        if self.origin[i] == origin {
            return;
        }
        self.origin[i] = origin;
        self.mark(id.idx, DirtyFlags::TRANSFORM_ORIGIN);
        self.inherited
            .mark_with(id.idx, dirty::SCENE_TRANSFORM, &EagerPolicy);
    }

    /// Replaces the custom transform list (innermost first).
    pub fn set_transforms(&mut self, id: ItemId, transforms: Vec<Transform3d>) {
        self.validate(id);
        self.transforms[id.idx as usize] = transforms;
        self.mark(id.idx, DirtyFlags::TRANSFORM);
        self.inherited
            .mark_with(id.idx, dirty::SCENE_TRANSFORM, &EagerPolicy);
    }

    /// Sets the item's own opacity, clamped to `0.0..=1.0`.
    pub fn set_opacity(&mut self, id: ItemId, opacity: f64) {
        self.validate(id);
        let i = id.idx as usize;
        let opacity = if opacity.is_nan() {
            0.0
        } else {
            opacity.clamp(0.0, 1.0)
        };
        if self.opacity[i] == opacity {
            return;
        }
        self.opacity[i] = opacity;
        self.mark(id.idx, DirtyFlags::OPACITY_VALUE);
    }

    /// Sets explicit visibility.
    ///
    /// Invisible items keep their nodes but contribute zero opacity, and are
    /// left out of the parent's child list unless an effect references them.
    pub fn set_visible(&mut self, id: ItemId, visible: bool) {
        self.validate(id);
        let i = id.idx as usize;
        if self.visible[i] == visible {
            return;
        }
        self.visible[i] = visible;
        self.mark(id.idx, DirtyFlags::VISIBLE);
        self.mark_parent(id.idx, DirtyFlags::CHILDREN_STACKING_CHANGED);
        self.inherited
            .mark_with(id.idx, dirty::EFFECTIVE_VISIBLE, &EagerPolicy);
    }

    /// Sets the explicit enabled state. Has no visual effect of its own.
    pub fn set_enabled(&mut self, id: ItemId, enabled: bool) {
        self.validate(id);
        let i = id.idx as usize;
        if self.enabled[i] == enabled {
            return;
        }
        self.enabled[i] = enabled;
        self.inherited
            .mark_with(id.idx, dirty::EFFECTIVE_ENABLED, &EagerPolicy);
    }

    /// Turns clipping to the item's bounds on or off.
    pub fn set_clip(&mut self, id: ItemId, clip: bool) {
        self.validate(id);
        let i = id.idx as usize;
        if self.clip[i] == clip {
            return;
        }
        self.clip[i] = clip;
        self.mark(id.idx, DirtyFlags::CLIP);
    }

    /// Sets the smooth-scaling hint.
    pub fn set_smooth(&mut self, id: ItemId, smooth: bool) {
        self.validate(id);
        let i = id.idx as usize;
        if self.smooth[i] == smooth {
            return;
        }
        self.smooth[i] = smooth;
        self.mark(id.idx, DirtyFlags::SMOOTH);
    }

    /// Sets the antialiasing hint.
    pub fn set_antialiasing(&mut self, id: ItemId, antialiasing: bool) {
        self.validate(id);
        let i = id.idx as usize;
        if self.antialiasing[i] == antialiasing {
            return;
        }
        self.antialiasing[i] = antialiasing;
        self.mark(id.idx, DirtyFlags::ANTIALIASING);
    }

    /// Sets the role flags.
    ///
    /// Toggling [`HAS_CONTENTS`](ItemFlags::HAS_CONTENTS) marks
    /// [`CONTENT`](DirtyFlags::CONTENT) so the paint node is created or
    /// dropped on the next sync.
    pub fn set_flags(&mut self, id: ItemId, flags: ItemFlags) {
        self.validate(id);
        let i = id.idx as usize;
        let changed = self.flags[i] ^ flags;
        self.flags[i] = flags;
        if changed.contains(ItemFlags::HAS_CONTENTS) {
            self.mark(id.idx, DirtyFlags::CONTENT);
        }
    }

    /// Schedules a paint-node update for the item.
    pub fn update(&mut self, id: ItemId) {
        self.validate(id);
        if !self.flags[id.idx as usize].contains(ItemFlags::HAS_CONTENTS) {
            log::warn!("update() on {id:?}, which has no contents");
            return;
        }
        self.mark(id.idx, DirtyFlags::CONTENT);
    }

    /// Registers an effect that uses this item as a source.
    ///
    /// The first reference marks [`EFFECT_REFERENCE`](DirtyFlags::EFFECT_REFERENCE)
    /// so sync inserts an effect root node. With `hide`, the item is also
    /// hidden from normal rendering until the matching
    /// [`deref_from_effect`](Self::deref_from_effect).
    pub fn ref_from_effect(&mut self, id: ItemId, hide: bool) {
        self.validate(id);
        let i = id.idx as usize;
        self.effect_refs[i] += 1;
        if self.effect_refs[i] == 1 {
            self.mark(id.idx, DirtyFlags::EFFECT_REFERENCE);
            self.mark_parent(id.idx, DirtyFlags::CHILDREN_STACKING_CHANGED);
        }
        if hide {
            self.hide_refs[i] += 1;
            if self.hide_refs[i] == 1 {
                self.mark(id.idx, DirtyFlags::HIDE_REFERENCE);
            }
        }
    }

    /// Drops an effect reference taken by
    /// [`ref_from_effect`](Self::ref_from_effect).
    ///
    /// # Panics
    ///
    /// Panics if no matching reference is held.
    pub fn deref_from_effect(&mut self, id: ItemId, unhide: bool) {
        self.validate(id);
        let i = id.idx as usize;
        assert!(self.effect_refs[i] > 0, "unbalanced deref_from_effect");
        self.effect_refs[i] -= 1;
        if self.effect_refs[i] == 0 {
            self.mark(id.idx, DirtyFlags::EFFECT_REFERENCE);
            self.mark_parent(id.idx, DirtyFlags::CHILDREN_STACKING_CHANGED);
        }
        if unhide {
            assert!(self.hide_refs[i] > 0, "unbalanced deref_from_effect");
            self.hide_refs[i] -= 1;
            if self.hide_refs[i] == 0 {
                self.mark(id.idx, DirtyFlags::HIDE_REFERENCE);
            }
        }
    }

    // -- Dirty list API --

    /// ORs `flags` into the item's pending mask and queues it for sync.
    ///
    /// Idempotent: an item is queued at most once per frame no matter how
    /// often it is marked. Items outside the window accumulate flags but are
    /// only queued once they join it.
    pub fn mark_dirty(&mut self, id: ItemId, flags: DirtyFlags) {
        self.validate(id);
        self.mark(id.idx, flags);
    }

    /// Pending dirty flags of an item.
    #[must_use]
    pub fn dirty_flags(&self, id: ItemId) -> DirtyFlags {
        self.validate(id);
        self.dirty_attrs[id.idx as usize]
    }

    /// Whether the item is currently queued for sync.
    #[must_use]
    pub fn is_queued(&self, id: ItemId) -> bool {
        self.validate(id);
        self.dirty_list.contains(id.idx)
    }

    /// Number of items queued for the next sync.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.dirty_list.len()
    }

    /// Detaches the whole dirty list and returns a snapshot of it.
    ///
    /// Each entry carries the flags accumulated up to this call, and every
    /// item's pending mask is reset. Anything marked afterwards, including
    /// from inside sync, is queued for the next drain.
    pub fn drain_dirty(&mut self) -> Vec<DirtyEntry> {
        let slots = self.dirty_list.take_all();
        let mut out = Vec::with_capacity(slots.len());
        for idx in slots {
            let flags = core::mem::take(&mut self.dirty_attrs[idx as usize]);
            let item = self.handle(idx);
            log::debug!("dirty {item:?}: {flags:?}");
            out.push(DirtyEntry { item, flags });
        }
        out
    }

    /// Marks every item in the window [`WINDOW`](DirtyFlags::WINDOW)-dirty so
    /// the next sync rebuilds all nodes from scratch.
    pub fn invalidate_scene_graph(&mut self) {
        self.released.clear();
        let mut stack = Vec::from([self.root]);
        while let Some(idx) = stack.pop() {
            self.mark(idx, DirtyFlags::WINDOW);
            let mut c = self.first_child[idx as usize];
            while c != INVALID {
                stack.push(c);
                c = self.next_sibling[c as usize];
            }
        }
    }

    /// Whether any sync or polish work is pending.
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        !self.dirty_list.is_empty() || !self.polish_queue.is_empty() || !self.released.is_empty()
    }

    // -- Crate-internal helpers for sync and delivery --

    pub(crate) fn take_released(&mut self) -> Vec<ItemId> {
        core::mem::take(&mut self.released)
    }

    fn take_delegate(&mut self, id: ItemId) -> Option<Box<dyn ItemDelegate>> {
        self.delegate[id.idx as usize].take()
    }

    fn restore_delegate(&mut self, id: ItemId, delegate: Box<dyn ItemDelegate>) {
        if self.is_alive(id) && self.delegate[id.idx as usize].is_none() {
            self.delegate[id.idx as usize] = Some(delegate);
        }
    }

    /// Runs `f` with the item's delegate lent out of the tree, so that `f`
    /// may mutate the tree too.
    ///
    /// The delegate is put back even when `f` panics; the panic then
    /// continues. Returns `None` when the item is dead or has no delegate.
    pub(crate) fn lend_delegate<R>(
        &mut self,
        id: ItemId,
        f: impl FnOnce(&mut Self, &mut dyn ItemDelegate) -> R,
    ) -> Option<R> {
        if !self.is_alive(id) {
            return None;
        }
        let mut delegate = self.take_delegate(id)?;
        #[cfg(feature = "std")]
        let result = std::panic::catch_unwind(core::panic::AssertUnwindSafe(|| {
            f(&mut *self, delegate.as_mut())
        }));
        #[cfg(not(feature = "std"))]
        let result: Result<R, core::convert::Infallible> = Ok(f(&mut *self, delegate.as_mut()));
        self.restore_delegate(id, delegate);
        match result {
            Ok(r) => Some(r),
            #[cfg(feature = "std")]
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }

    /// Runs `f` with the item's delegate and a context for mutating the tree.
    pub(crate) fn with_delegate<R>(
        &mut self,
        id: ItemId,
        f: impl FnOnce(&mut dyn ItemDelegate, &mut ItemContext<'_>) -> R,
    ) -> Option<R> {
        self.lend_delegate(id, |tree, delegate| {
            let mut ctx = ItemContext { tree, item: id };
            f(delegate, &mut ctx)
        })
    }

    /// Handle for a live slot.
    pub(crate) fn handle(&self, idx: u32) -> ItemId {
        ItemId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: ItemId) {
        assert!(
            self.is_alive(id),
            "stale ItemId: {id:?} (current gen: {})",
            self.generation.get(id.idx as usize).copied().unwrap_or(u32::MAX)
        );
    }

    pub(crate) fn mark(&mut self, idx: u32, flags: DirtyFlags) {
        self.dirty_attrs[idx as usize] |= flags;
        if self.in_window[idx as usize] {
            self.dirty_list.push_front(idx);
        }
    }

    // -- Internal helpers --

    fn stacking_z(&self, idx: u32) -> f64 {
        let z = self.z[idx as usize];
        if z.is_nan() { 0.0 } else { z }
    }

    fn geometry(&self, i: usize) -> Rect {
        Rect::from_origin_size(self.position[i], self.size[i])
    }

    fn apply_size(&mut self, id: ItemId, size: Size) {
        let i = id.idx as usize;
        if self.size[i] == size {
            return;
        }
        let old = self.geometry(i);
        self.size[i] = size;
        self.mark(id.idx, DirtyFlags::SIZE);
        self.inherited
            .mark_with(id.idx, dirty::SCENE_TRANSFORM, &EagerPolicy);
        self.notify_geometry(id, old);
    }

    fn notify_geometry(&mut self, id: ItemId, old: Rect) {
        let new = self.geometry(id.idx as usize);
        self.with_delegate(id, |d, ctx| d.geometry_changed(ctx, old, new));
    }

    fn mark_basic_transform(&mut self, idx: u32) {
        self.mark(idx, DirtyFlags::BASIC_TRANSFORM);
        self.inherited
            .mark_with(idx, dirty::SCENE_TRANSFORM, &EagerPolicy);
    }

    fn mark_parent(&mut self, idx: u32, flags: DirtyFlags) {
        let p = self.parent[idx as usize];
        if p != INVALID {
            self.mark(p, flags);
        }
    }

    fn mark_inherited(&mut self, idx: u32) {
        self.inherited
            .mark_with(idx, dirty::EFFECTIVE_VISIBLE, &EagerPolicy);
        self.inherited
            .mark_with(idx, dirty::EFFECTIVE_ENABLED, &EagerPolicy);
        self.inherited
            .mark_with(idx, dirty::SCENE_TRANSFORM, &EagerPolicy);
    }

    fn check_link(&self, parent: ItemId, child: ItemId) {
        self.validate(parent);
        self.validate(child);
        assert!(
            self.parent[child.idx as usize] == INVALID,
            "child already has a parent"
        );
        let mut a = parent.idx;
        while a != INVALID {
            assert!(a != child.idx, "cannot make an item its own ancestor");
            a = self.parent[a as usize];
        }
    }

    /// Links `c` under `p`, before `before` or at the end when `INVALID`.
    fn link_child(&mut self, p: u32, c: u32, before: u32) {
        self.parent[c as usize] = p;
        if before == INVALID {
            let mut last = self.first_child[p as usize];
            if last == INVALID {
                self.first_child[p as usize] = c;
                self.prev_sibling[c as usize] = INVALID;
            } else {
                while self.next_sibling[last as usize] != INVALID {
                    last = self.next_sibling[last as usize];
                }
                self.next_sibling[last as usize] = c;
                self.prev_sibling[c as usize] = last;
            }
            self.next_sibling[c as usize] = INVALID;
        } else {
            let prev = self.prev_sibling[before as usize];
            self.prev_sibling[c as usize] = prev;
            self.next_sibling[c as usize] = before;
            if prev != INVALID {
                self.next_sibling[prev as usize] = c;
            } else {
                self.first_child[p as usize] = c;
            }
            self.prev_sibling[before as usize] = c;
        }
        for ch in [
            dirty::EFFECTIVE_VISIBLE,
            dirty::EFFECTIVE_ENABLED,
            dirty::SCENE_TRANSFORM,
        ] {
            let _ = self.inherited.add_dependency(c, p, ch);
        }
    }

    /// Unlinks `c` from its parent and marks the parent
    /// [`CHILDREN_CHANGED`](DirtyFlags::CHILDREN_CHANGED).
    fn unlink_child(&mut self, c: u32) {
        let p = self.parent[c as usize];
        let prev = self.prev_sibling[c as usize];
        let next = self.next_sibling[c as usize];
        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            self.first_child[p as usize] = next;
        }
        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }
        self.parent[c as usize] = INVALID;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;
        for ch in [
            dirty::EFFECTIVE_VISIBLE,
            dirty::EFFECTIVE_ENABLED,
            dirty::SCENE_TRANSFORM,
        ] {
            self.inherited.remove_dependency(c, p, ch);
        }
        self.mark(p, DirtyFlags::CHILDREN_CHANGED);
    }

    fn after_link(&mut self, p: u32, c: u32, was_in_window: bool) {
        self.mark(p, DirtyFlags::CHILDREN_CHANGED);
        self.mark(c, DirtyFlags::PARENT_CHANGED);
        if self.in_window[p as usize] && !was_in_window {
            self.enter_window(c);
        }
        self.mark_inherited(c);
    }

    fn collect_subtree(&self, idx: u32, out: &mut Vec<u32>) {
        let mut stack = Vec::from([idx]);
        while let Some(i) = stack.pop() {
            out.push(i);
            let mut c = self.first_child[i as usize];
            while c != INVALID {
                stack.push(c);
                c = self.next_sibling[c as usize];
            }
        }
    }

    fn enter_window(&mut self, idx: u32) {
        let mut subtree = Vec::new();
        self.collect_subtree(idx, &mut subtree);
        for i in subtree {
            self.in_window[i as usize] = true;
            self.mark(i, DirtyFlags::WINDOW);
            if self.polish_scheduled[i as usize] && !self.polish_queue.contains(&i) {
                self.polish_queue.push(i);
            }
        }
    }

    fn leave_window(&mut self, idx: u32) {
        let mut subtree = Vec::new();
        self.collect_subtree(idx, &mut subtree);
        for i in subtree {
            self.in_window[i as usize] = false;
            self.dirty_list.remove(i);
            self.dirty_attrs[i as usize] = DirtyFlags::empty();
            self.polish_queue.retain(|&q| q != i);
            self.released.push(self.handle(i));
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    fn attached(tree: &mut ItemTree) -> ItemId {
        let id = tree.create_item();
        let root = tree.root();
        tree.add_child(root, id);
        id
    }

    #[test]
    fn create_and_destroy() {
        let mut tree = ItemTree::new();
        let id = tree.create_item();
        assert!(tree.is_alive(id));
        assert_eq!(tree.len(), 2);
        tree.destroy_item(id);
        assert!(!tree.is_alive(id));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut tree = ItemTree::new();
        let a = tree.create_item();
        tree.destroy_item(a);
        let b = tree.create_item();
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(!tree.is_alive(a));
    }

    #[test]
    #[should_panic(expected = "stale ItemId")]
    fn destroyed_handle_panics() {
        let mut tree = ItemTree::new();
        let a = tree.create_item();
        tree.destroy_item(a);
        let _ = tree.position(a);
    }

    #[test]
    #[should_panic(expected = "cannot destroy the root item")]
    fn root_is_permanent() {
        let mut tree = ItemTree::new();
        let root = tree.root();
        tree.destroy_item(root);
    }

    #[test]
    #[should_panic(expected = "cannot make an item its own ancestor")]
    fn cycles_are_rejected() {
        let mut tree = ItemTree::new();
        let a = tree.create_item();
        let b = tree.create_item();
        tree.add_child(a, b);
        tree.add_child(b, a);
    }

    #[test]
    fn insert_before_and_children_order() {
        let mut tree = ItemTree::new();
        let p = attached(&mut tree);
        let a = tree.create_item();
        let b = tree.create_item();
        let c = tree.create_item();
        tree.add_child(p, a);
        tree.add_child(p, c);
        tree.insert_before(b, c);
        assert_eq!(tree.children(p).collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(tree.parent(b), Some(p));
    }

    #[test]
    fn destroy_removes_subtree_and_releases_nodes() {
        let mut tree = ItemTree::new();
        let p = attached(&mut tree);
        let c = tree.create_item();
        tree.add_child(p, c);
        let _ = tree.drain_dirty();
        tree.destroy_item(p);
        assert!(!tree.is_alive(c));
        assert_eq!(tree.take_released().len(), 2);
        assert!(tree.is_queued(tree.root()), "root lost a child");
    }

    #[test]
    fn detached_items_are_not_queued_until_attached() {
        let mut tree = ItemTree::new();
        let _ = tree.drain_dirty();
        let a = tree.create_item();
        tree.set_opacity(a, 0.5);
        assert!(!tree.is_queued(a));
        assert_eq!(tree.dirty_flags(a), DirtyFlags::OPACITY_VALUE);
        let root = tree.root();
        tree.add_child(root, a);
        assert!(tree.is_queued(a));
        assert!(tree.dirty_flags(a).contains(DirtyFlags::WINDOW));
    }

    #[test]
    fn repeated_marks_queue_once() {
        let mut tree = ItemTree::new();
        let a = attached(&mut tree);
        let _ = tree.drain_dirty();
        for _ in 0..5 {
            tree.mark_dirty(a, DirtyFlags::CONTENT);
        }
        tree.mark_dirty(a, DirtyFlags::SIZE);
        let drained = tree.drain_dirty();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].flags, DirtyFlags::CONTENT | DirtyFlags::SIZE);
        assert!(tree.drain_dirty().is_empty());
    }

    #[test]
    fn z_change_marks_parent_stacking() {
        let mut tree = ItemTree::new();
        let a = attached(&mut tree);
        let _ = tree.drain_dirty();
        tree.set_z(a, 2.0);
        let drained = tree.drain_dirty();
        let root = drained
            .iter()
            .find(|e| e.item == tree.root())
            .map(|e| e.flags);
        assert_eq!(root, Some(DirtyFlags::CHILDREN_STACKING_CHANGED));
    }

    #[test]
    fn paint_order_is_stable_by_z() {
        let mut tree = ItemTree::new();
        let p = attached(&mut tree);
        let ids: Vec<_> = (0..5).map(|_| tree.create_item()).collect();
        for &id in &ids {
            tree.add_child(p, id);
        }
        assert_eq!(tree.paint_order_children(p), ids);

        tree.set_z(ids[0], 1.0);
        tree.set_z(ids[3], -1.0);
        tree.set_z(ids[4], f64::NAN);
        assert_eq!(
            tree.paint_order_children(p),
            vec![ids[3], ids[1], ids[2], ids[4], ids[0]]
        );
    }

    #[test]
    fn implicit_size_yields_to_explicit() {
        let mut tree = ItemTree::new();
        let a = tree.create_item();
        tree.set_implicit_size(a, Size::new(10.0, 10.0));
        assert_eq!(tree.size(a), Size::new(10.0, 10.0));
        tree.set_size(a, Size::new(3.0, 4.0));
        tree.set_implicit_size(a, Size::new(20.0, 20.0));
        assert_eq!(tree.size(a), Size::new(3.0, 4.0));
        tree.reset_size(a);
        assert_eq!(tree.size(a), Size::new(20.0, 20.0));
    }

    #[test]
    fn effect_refs_mark_on_transitions_only() {
        let mut tree = ItemTree::new();
        let a = attached(&mut tree);
        let _ = tree.drain_dirty();
        tree.ref_from_effect(a, true);
        assert!(tree.dirty_flags(a).contains(DirtyFlags::EFFECT_REFERENCE));
        assert!(tree.dirty_flags(a).contains(DirtyFlags::HIDE_REFERENCE));
        assert_eq!(tree.effective_opacity(a), 0.0);
        let _ = tree.drain_dirty();
        tree.ref_from_effect(a, false);
        assert!(!tree.is_queued(a));
        tree.deref_from_effect(a, false);
        tree.deref_from_effect(a, true);
        assert!(tree.dirty_flags(a).contains(DirtyFlags::EFFECT_REFERENCE));
        assert_eq!(tree.effective_opacity(a), 1.0);
    }

    #[test]
    fn reparent_inside_window_keeps_nodes() {
        let mut tree = ItemTree::new();
        let p1 = attached(&mut tree);
        let p2 = attached(&mut tree);
        let c = tree.create_item();
        tree.add_child(p1, c);
        let _ = tree.drain_dirty();
        tree.reparent(c, p2);
        assert!(tree.take_released().is_empty());
        assert!(tree.dirty_flags(p1).contains(DirtyFlags::CHILDREN_CHANGED));
        assert!(tree.dirty_flags(p2).contains(DirtyFlags::CHILDREN_CHANGED));
        assert!(!tree.dirty_flags(c).contains(DirtyFlags::WINDOW));
    }

    #[test]
    fn removing_from_window_releases_subtree() {
        let mut tree = ItemTree::new();
        let p = attached(&mut tree);
        let c = tree.create_item();
        tree.add_child(p, c);
        tree.remove_from_parent(p);
        assert!(!tree.in_window(p));
        assert!(!tree.in_window(c));
        assert!(!tree.is_queued(c));
        assert_eq!(tree.take_released(), vec![p, c]);
    }

    #[test]
    fn local_matrix_rotates_about_origin() {
        let mut tree = ItemTree::new();
        let a = tree.create_item();
        tree.set_position(a, Point::new(10.0, 20.0));
        tree.set_size(a, Size::new(100.0, 50.0));
        tree.set_scale(a, 2.0);
        let m = tree.local_matrix(a);
        // Center (50, 25) stays fixed, then translates by the position.
        let c = m.map_point(Point::new(50.0, 25.0));
        assert!((c.x - 60.0).abs() < 1e-9 && (c.y - 45.0).abs() < 1e-9, "{c:?}");
        let tl = m.map_point(Point::ZERO);
        assert!((tl.x + 40.0).abs() < 1e-9 && (tl.y - -5.0).abs() < 1e-9, "{tl:?}");
    }

    #[cfg(feature = "std")]
    #[test]
    fn panicking_callback_keeps_its_delegate() {
        use alloc::sync::Arc;
        use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

        struct Flaky {
            armed: Arc<AtomicBool>,
            calls: Arc<AtomicUsize>,
        }

        impl ItemDelegate for Flaky {
            fn update_polish(&mut self, _: &mut ItemContext<'_>) {
                self.calls.fetch_add(1, Ordering::Relaxed);
                assert!(!self.armed.load(Ordering::Relaxed), "polish failed");
            }
        }

        let mut tree = ItemTree::new();
        let armed = Arc::new(AtomicBool::new(true));
        let calls = Arc::new(AtomicUsize::new(0));
        let a = tree.create_item_with(Box::new(Flaky {
            armed: Arc::clone(&armed),
            calls: Arc::clone(&calls),
        }));
        let root = tree.root();
        tree.add_child(root, a);

        tree.polish(a);
        let caught = std::panic::catch_unwind(core::panic::AssertUnwindSafe(|| {
            tree.polish_items(10)
        }));
        assert!(caught.is_err(), "the panic still propagates");

        armed.store(false, Ordering::Relaxed);
        tree.polish(a);
        tree.polish_items(10);
        assert_eq!(calls.load(Ordering::Relaxed), 2, "delegate ran again");
    }

    #[test]
    fn opacity_is_clamped() {
        let mut tree = ItemTree::new();
        let a = tree.create_item();
        tree.set_opacity(a, 3.0);
        assert_eq!(tree.opacity(a), 1.0);
        tree.set_opacity(a, -1.0);
        assert_eq!(tree.opacity(a), 0.0);
    }
}
