// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays render-node storage.

use alloc::vec::Vec;

use bitflags::bitflags;
use kurbo::Rect;

use super::id::{ContentKey, NodeId};
use crate::item::INVALID;
use crate::transform::Transform3d;

/// Leaf content carried by a paint node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintContent {
    /// Bounds of the content in the owning item's local coordinates.
    pub bounds: Rect,
    /// Key of the delegate-owned content.
    pub key: ContentKey,
    /// Whether the renderer may filter the content when scaling.
    pub smooth: bool,
}

/// The variant-specific payload of a render node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeKind {
    /// The graph root. Exactly one exists per graph.
    Root,
    /// An item's own node, carrying its local 4×4 matrix.
    Transform {
        /// Item-to-parent matrix.
        matrix: Transform3d,
    },
    /// Rectangular clip applied to everything below.
    Clip {
        /// Clip rectangle in the item's local coordinates.
        rect: Rect,
    },
    /// Opacity multiplier applied to everything below.
    Opacity {
        /// Multiplier in `0.0..=1.0`.
        opacity: f64,
    },
    /// Detachable subtree root for items referenced by an effect.
    EffectRoot,
    /// Leaf content.
    Paint(PaintContent),
}

bitflags! {
    /// What changed on a node since the renderer last looked.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NodeDirtyFlags: u16 {
        /// Transform matrix changed.
        const MATRIX = 1 << 0;
        /// Clip rectangle changed.
        const CLIP_RECT = 1 << 1;
        /// Opacity changed.
        const OPACITY = 1 << 2;
        /// Paint content changed.
        const PAINT = 1 << 3;
        /// The node was inserted under a parent.
        const NODE_ADDED = 1 << 4;
        /// The node was removed from its parent.
        const NODE_REMOVED = 1 << 5;
    }
}

/// Struct-of-arrays storage for render nodes.
///
/// Nodes are addressed by [`NodeId`] handles. The graph owns every node; items
/// only hold handles to the nodes built for them. Destroyed slots are
/// recycled via a free list and generation counters reject stale handles.
#[derive(Debug)]
pub struct NodeGraph {
    // -- Topology --
    parent: Vec<u32>,
    first_child: Vec<u32>,
    last_child: Vec<u32>,
    next_sibling: Vec<u32>,
    prev_sibling: Vec<u32>,
    child_count: Vec<u32>,

    // -- Payload --
    kind: Vec<NodeKind>,

    // -- Allocation --
    generation: Vec<u32>,
    alive: Vec<bool>,
    free_list: Vec<u32>,
    live: usize,

    // -- Dirty tracking --
    dirty: Vec<NodeDirtyFlags>,
    dirty_queue: Vec<u32>,
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeGraph {
    /// Creates a graph containing only the root node.
    #[must_use]
    pub fn new() -> Self {
        let mut graph = Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            last_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            child_count: Vec::new(),
            kind: Vec::new(),
            generation: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            dirty: Vec::new(),
            dirty_queue: Vec::new(),
        };
        graph.alloc(NodeKind::Root);
        graph
    }

    /// Returns the root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId {
            idx: 0,
            generation: self.generation[0],
        }
    }

    /// Number of live nodes, the root included.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.live
    }

    /// Returns whether the given handle refers to a live node.
    #[must_use]
    pub fn is_alive(&self, id: NodeId) -> bool {
        (id.idx as usize) < self.alive.len()
            && self.alive[id.idx as usize]
            && self.generation[id.idx as usize] == id.generation
    }

    // -- Creation --

    /// Creates a detached transform node.
    pub fn create_transform(&mut self, matrix: Transform3d) -> NodeId {
        self.alloc(NodeKind::Transform { matrix })
    }

    /// Creates a detached clip node.
    pub fn create_clip(&mut self, rect: Rect) -> NodeId {
        self.alloc(NodeKind::Clip { rect })
    }

    /// Creates a detached opacity node.
    pub fn create_opacity(&mut self, opacity: f64) -> NodeId {
        self.alloc(NodeKind::Opacity { opacity })
    }

    /// Creates a detached effect root node.
    pub fn create_effect_root(&mut self) -> NodeId {
        self.alloc(NodeKind::EffectRoot)
    }

    /// Creates a detached paint node.
    pub fn create_paint(&mut self, content: PaintContent) -> NodeId {
        self.alloc(NodeKind::Paint(content))
    }

    /// Destroys a node.
    ///
    /// The node is removed from its parent and its children are detached
    /// (not destroyed), since they may belong to other items.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or refers to the root.
    pub fn destroy(&mut self, id: NodeId) {
        self.validate(id);
        assert!(id.idx != 0, "cannot destroy the root node");
        let idx = id.idx;
        if self.parent[idx as usize] != INVALID {
            self.unlink(idx);
        }
        self.detach_children(idx);
        self.dirty[idx as usize] = NodeDirtyFlags::empty();
        self.alive[idx as usize] = false;
        self.generation[idx as usize] = self.generation[idx as usize].wrapping_add(1);
        self.free_list.push(idx);
        self.live -= 1;
    }

    /// Destroys every node except the root.
    pub fn clear(&mut self) {
        let live: Vec<NodeId> = (1..self.alive.len())
            .filter(|&i| self.alive[i])
            .filter_map(|i| self.handle(u32::try_from(i).ok()?))
            .collect();
        for id in live {
            self.destroy(id);
        }
        self.dirty_queue.clear();
    }

    // -- Payload --

    /// Returns the payload of a node.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        self.validate(id);
        &self.kind[id.idx as usize]
    }

    /// Returns the matrix of a transform node.
    #[must_use]
    pub fn matrix(&self, id: NodeId) -> Option<Transform3d> {
        match *self.kind(id) {
            NodeKind::Transform { matrix } => Some(matrix),
            _ => None,
        }
    }

    /// Returns the rectangle of a clip node.
    #[must_use]
    pub fn clip_rect(&self, id: NodeId) -> Option<Rect> {
        match *self.kind(id) {
            NodeKind::Clip { rect } => Some(rect),
            _ => None,
        }
    }

    /// Returns the value of an opacity node.
    #[must_use]
    pub fn opacity(&self, id: NodeId) -> Option<f64> {
        match *self.kind(id) {
            NodeKind::Opacity { opacity } => Some(opacity),
            _ => None,
        }
    }

    /// Returns the content of a paint node.
    #[must_use]
    pub fn paint_content(&self, id: NodeId) -> Option<PaintContent> {
        match *self.kind(id) {
            NodeKind::Paint(content) => Some(content),
            _ => None,
        }
    }

    /// Sets the matrix of a transform node. No-op when unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the node is not a transform node.
    pub fn set_matrix(&mut self, id: NodeId, matrix: Transform3d) {
        self.validate(id);
        match &mut self.kind[id.idx as usize] {
            NodeKind::Transform { matrix: m } => {
                if *m == matrix {
                    return;
                }
                *m = matrix;
            }
            other => panic!("set_matrix on {other:?}"),
        }
        self.mark_dirty(id, NodeDirtyFlags::MATRIX);
    }

    /// Sets the rectangle of a clip node. No-op when unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the node is not a clip node.
    pub fn set_clip_rect(&mut self, id: NodeId, rect: Rect) {
        self.validate(id);
        match &mut self.kind[id.idx as usize] {
            NodeKind::Clip { rect: r } => {
                if *r == rect {
                    return;
                }
                *r = rect;
            }
            other => panic!("set_clip_rect on {other:?}"),
        }
        self.mark_dirty(id, NodeDirtyFlags::CLIP_RECT);
    }

    /// Sets the value of an opacity node. No-op when unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the node is not an opacity node.
    pub fn set_opacity(&mut self, id: NodeId, opacity: f64) {
        self.validate(id);
        match &mut self.kind[id.idx as usize] {
            NodeKind::Opacity { opacity: o } => {
                if *o == opacity {
                    return;
                }
                *o = opacity;
            }
            other => panic!("set_opacity on {other:?}"),
        }
        self.mark_dirty(id, NodeDirtyFlags::OPACITY);
    }

    /// Replaces the content of a paint node.
    ///
    /// # Panics
    ///
    /// Panics if the node is not a paint node.
    pub fn set_paint_content(&mut self, id: NodeId, content: PaintContent) {
        self.validate(id);
        match &mut self.kind[id.idx as usize] {
            NodeKind::Paint(c) => *c = content,
            other => panic!("set_paint_content on {other:?}"),
        }
        self.mark_dirty(id, NodeDirtyFlags::PAINT);
    }

    // -- Topology --

    /// Returns the parent of a node, if any.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        self.handle(self.parent[id.idx as usize])
    }

    /// Returns the first child of a node, if any.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        self.handle(self.first_child[id.idx as usize])
    }

    /// Returns the next sibling of a node, if any.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        self.handle(self.next_sibling[id.idx as usize])
    }

    /// Returns the number of direct children.
    #[must_use]
    pub fn child_count(&self, id: NodeId) -> usize {
        self.validate(id);
        self.child_count[id.idx as usize] as usize
    }

    /// Returns an iterator over the direct children of a node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> NodeChildren<'_> {
        self.validate(id);
        NodeChildren {
            graph: self,
            current: self.first_child[id.idx as usize],
        }
    }

    /// Appends `child` as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale or `child` already has a parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.check_insert(parent, child);
        let (p, c) = (parent.idx, child.idx);
        let last = self.last_child[p as usize];
        self.link(p, c, last, INVALID);
    }

    /// Inserts `child` as the first child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale or `child` already has a parent.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        self.check_insert(parent, child);
        let (p, c) = (parent.idx, child.idx);
        let first = self.first_child[p as usize];
        self.link(p, c, INVALID, first);
    }

    /// Inserts `child` immediately before `before` under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale, `child` already has a parent, or `before`
    /// is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: NodeId) {
        self.check_insert(parent, child);
        self.validate(before);
        assert!(
            self.parent[before.idx as usize] == parent.idx,
            "anchor node is not a child of {parent:?}"
        );
        let prev = self.prev_sibling[before.idx as usize];
        self.link(parent.idx, child.idx, prev, before.idx);
    }

    /// Inserts `child` immediately after `after` under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale, `child` already has a parent, or `after`
    /// is not a child of `parent`.
    pub fn insert_after(&mut self, parent: NodeId, child: NodeId, after: NodeId) {
        self.check_insert(parent, child);
        self.validate(after);
        assert!(
            self.parent[after.idx as usize] == parent.idx,
            "anchor node is not a child of {parent:?}"
        );
        let next = self.next_sibling[after.idx as usize];
        self.link(parent.idx, child.idx, after.idx, next);
    }

    /// Removes `child` from `parent`.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale or `child` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        self.validate(parent);
        self.validate(child);
        assert!(
            self.parent[child.idx as usize] == parent.idx,
            "{child:?} is not a child of {parent:?}"
        );
        self.unlink(child.idx);
    }

    /// Detaches `child` from whatever parent it has. No-op for orphans.
    pub fn detach(&mut self, child: NodeId) {
        self.validate(child);
        if self.parent[child.idx as usize] != INVALID {
            self.unlink(child.idx);
        }
    }

    /// Removes every child of `parent`.
    pub fn remove_all_children(&mut self, parent: NodeId) {
        self.validate(parent);
        self.detach_children(parent.idx);
    }

    /// Moves every child of `from`, in order, to the end of `to`.
    ///
    /// # Panics
    ///
    /// Panics if a handle is stale or `from == to`.
    pub fn reparent_children_to(&mut self, from: NodeId, to: NodeId) {
        self.validate(from);
        self.validate(to);
        assert!(from != to, "cannot reparent children onto the same node");
        let mut c = self.first_child[from.idx as usize];
        while c != INVALID {
            let next = self.next_sibling[c as usize];
            self.unlink(c);
            let last = self.last_child[to.idx as usize];
            self.link(to.idx, c, last, INVALID);
            c = next;
        }
    }

    // -- Dirty tracking --

    /// ORs `flags` into the node's pending renderer-facing state.
    pub fn mark_dirty(&mut self, id: NodeId, flags: NodeDirtyFlags) {
        self.validate(id);
        let slot = &mut self.dirty[id.idx as usize];
        if slot.is_empty() {
            self.dirty_queue.push(id.idx);
        }
        *slot |= flags;
    }

    /// Takes every pending node change, in the order nodes first became dirty.
    pub fn take_dirty(&mut self) -> Vec<(NodeId, NodeDirtyFlags)> {
        let queue = core::mem::take(&mut self.dirty_queue);
        let mut out = Vec::with_capacity(queue.len());
        for idx in queue {
            let flags = core::mem::take(&mut self.dirty[idx as usize]);
            if !flags.is_empty() && self.alive[idx as usize] {
                out.push((
                    NodeId {
                        idx,
                        generation: self.generation[idx as usize],
                    },
                    flags,
                ));
            }
        }
        out
    }

    // -- Internal helpers --

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let idx = if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.last_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.child_count[i] = 0;
            self.kind[i] = kind;
            self.alive[i] = true;
            idx
        } else {
            let idx = u32::try_from(self.kind.len()).unwrap_or(INVALID);
            assert!(idx != INVALID, "node graph exhausted");
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.last_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.child_count.push(0);
            self.kind.push(kind);
            self.generation.push(0);
            self.alive.push(true);
            self.dirty.push(NodeDirtyFlags::empty());
            idx
        };
        self.live += 1;
        NodeId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Panics if the handle is stale.
    fn validate(&self, id: NodeId) {
        assert!(
            self.is_alive(id),
            "stale NodeId: {id:?} (current gen: {})",
            self.generation.get(id.idx as usize).copied().unwrap_or(u32::MAX)
        );
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) {
        self.validate(parent);
        self.validate(child);
        assert!(parent != child, "cannot insert a node under itself");
        assert!(
            self.parent[child.idx as usize] == INVALID,
            "node already has a parent"
        );
    }

    fn handle(&self, idx: u32) -> Option<NodeId> {
        (idx != INVALID).then(|| NodeId {
            idx,
            generation: self.generation[idx as usize],
        })
    }

    fn link(&mut self, p: u32, c: u32, prev: u32, next: u32) {
        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = prev;
        self.next_sibling[c as usize] = next;
        if prev != INVALID {
            self.next_sibling[prev as usize] = c;
        } else {
            self.first_child[p as usize] = c;
        }
        if next != INVALID {
            self.prev_sibling[next as usize] = c;
        } else {
            self.last_child[p as usize] = c;
        }
        self.child_count[p as usize] += 1;
        let id = NodeId {
            idx: c,
            generation: self.generation[c as usize],
        };
        self.mark_dirty(id, NodeDirtyFlags::NODE_ADDED);
    }

    fn unlink(&mut self, c: u32) {
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
        } else {
            self.last_child[p as usize] = prev;
        }
        self.child_count[p as usize] -= 1;
        self.parent[c as usize] = INVALID;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;
        let id = NodeId {
            idx: c,
            generation: self.generation[c as usize],
        };
        self.mark_dirty(id, NodeDirtyFlags::NODE_REMOVED);
    }

    fn detach_children(&mut self, p: u32) {
        while self.first_child[p as usize] != INVALID {
            let c = self.first_child[p as usize];
            self.unlink(c);
        }
    }
}

/// An iterator over the direct children of a node.
///
/// Created by [`NodeGraph::children`].
#[derive(Debug)]
pub struct NodeChildren<'a> {
    graph: &'a NodeGraph,
    current: u32,
}

impl Iterator for NodeChildren<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.graph.next_sibling[idx as usize];
        Some(NodeId {
            idx,
            generation: self.graph.generation[idx as usize],
        })
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    fn paint(key: u64) -> PaintContent {
        PaintContent {
            bounds: Rect::new(0.0, 0.0, 10.0, 10.0),
            key: ContentKey(key),
            smooth: true,
        }
    }

    #[test]
    fn new_graph_has_only_root() {
        let g = NodeGraph::new();
        assert_eq!(g.node_count(), 1);
        assert_eq!(*g.kind(g.root()), NodeKind::Root);
        assert_eq!(g.parent(g.root()), None);
    }

    #[test]
    fn append_prepend_and_insert_keep_order() {
        let mut g = NodeGraph::new();
        let root = g.root();
        let a = g.create_effect_root();
        let b = g.create_effect_root();
        let c = g.create_effect_root();
        let d = g.create_effect_root();
        g.append_child(root, b);
        g.prepend_child(root, a);
        g.append_child(root, d);
        g.insert_before(root, c, d);
        let kids: Vec<_> = g.children(root).collect();
        assert_eq!(kids, vec![a, b, c, d]);
        assert_eq!(g.child_count(root), 4);

        let e = g.create_effect_root();
        g.insert_after(root, e, a);
        let kids: Vec<_> = g.children(root).collect();
        assert_eq!(kids, vec![a, e, b, c, d]);
    }

    #[test]
    fn reparent_children_moves_in_order() {
        let mut g = NodeGraph::new();
        let root = g.root();
        let holder = g.create_opacity(0.5);
        let a = g.create_paint(paint(1));
        let b = g.create_paint(paint(2));
        g.append_child(root, a);
        g.append_child(root, b);
        g.reparent_children_to(root, holder);
        g.append_child(root, holder);
        assert_eq!(g.children(root).collect::<Vec<_>>(), vec![holder]);
        assert_eq!(g.children(holder).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(g.parent(a), Some(holder));
    }

    #[test]
    fn destroy_detaches_children() {
        let mut g = NodeGraph::new();
        let t = g.create_transform(Transform3d::IDENTITY);
        let p = g.create_paint(paint(1));
        g.append_child(g.root(), t);
        g.append_child(t, p);
        g.destroy(t);
        assert!(!g.is_alive(t));
        assert!(g.is_alive(p));
        assert_eq!(g.parent(p), None);
        assert_eq!(g.child_count(g.root()), 0);
    }

    #[test]
    fn destroyed_slot_gets_new_generation() {
        let mut g = NodeGraph::new();
        let a = g.create_effect_root();
        g.destroy(a);
        let b = g.create_effect_root();
        assert_eq!(a.index(), b.index());
        assert_ne!(a, b);
        assert!(!g.is_alive(a));
    }

    #[test]
    #[should_panic(expected = "stale NodeId")]
    fn stale_handle_panics() {
        let mut g = NodeGraph::new();
        let a = g.create_opacity(1.0);
        g.destroy(a);
        let _ = g.kind(a);
    }

    #[test]
    #[should_panic(expected = "node already has a parent")]
    fn double_parent_panics() {
        let mut g = NodeGraph::new();
        let a = g.create_opacity(1.0);
        let b = g.create_opacity(1.0);
        g.append_child(g.root(), a);
        g.append_child(b, a);
    }

    #[test]
    fn setters_mark_dirty_only_on_change() {
        let mut g = NodeGraph::new();
        let o = g.create_opacity(1.0);
        let _ = g.take_dirty();
        g.set_opacity(o, 1.0);
        assert!(g.take_dirty().is_empty());
        g.set_opacity(o, 0.25);
        assert_eq!(g.take_dirty(), vec![(o, NodeDirtyFlags::OPACITY)]);
        assert_eq!(g.opacity(o), Some(0.25));
    }

    #[test]
    fn take_dirty_merges_flags() {
        let mut g = NodeGraph::new();
        let t = g.create_transform(Transform3d::IDENTITY);
        g.append_child(g.root(), t);
        g.set_matrix(t, Transform3d::from_translation(1.0, 0.0, 0.0));
        let dirty = g.take_dirty();
        assert_eq!(dirty.len(), 1);
        assert_eq!(
            dirty[0].1,
            NodeDirtyFlags::NODE_ADDED | NodeDirtyFlags::MATRIX
        );
    }

    #[test]
    fn clear_keeps_root() {
        let mut g = NodeGraph::new();
        let a = g.create_effect_root();
        let b = g.create_paint(paint(3));
        g.append_child(g.root(), a);
        g.append_child(a, b);
        g.clear();
        assert_eq!(g.node_count(), 1);
        assert!(g.is_alive(g.root()));
        assert!(g.children(g.root()).next().is_none());
        assert!(g.take_dirty().is_empty());
    }
}
