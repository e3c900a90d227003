// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-item to render-node reconciliation.
//!
//! [`SyncEngine::synchronize`] drains the item tree's dirty list once per
//! frame and brings each drained item's node chain up to date. Work per item
//! is proportional to what changed: matrices are recomputed only for
//! transform flags, layers are spliced in or out only when their presence
//! flips, and child lists are patched with a single left-to-right scan that
//! keeps existing nodes in place.
//!
//! Per item, the steps run in a fixed order:
//!
//! 1. transform matrix
//! 2. clip layer presence
//! 3. effect root presence
//! 4. child list
//! 5. clip rect
//! 6. opacity layer and value
//! 7. paint node
//!
//! The engine keeps a back-reference table from item slots to their nodes.
//! Nodes of items that left the window are destroyed at the start of the
//! following pass.

use alloc::vec::Vec;

#[cfg(feature = "trace-rich")]
use crate::dirty::DirtyEntry;
use crate::dirty::DirtyFlags;
use crate::item::{ItemFlags, ItemId, ItemTree, PaintNodeContext};
use crate::node::{NodeGraph, NodeId, NodeKind, PaintError};
use crate::transform::Transform3d;

// ---------------------------------------------------------------------------
// Configuration and results
// ---------------------------------------------------------------------------

/// Behavior switches for the sync engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Run the layering check on every item after it is updated.
    pub verify_nodes: bool,
    /// Panic when the layering check fails instead of reporting the error.
    pub panic_on_structural_error: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            verify_nodes: cfg!(debug_assertions),
            panic_on_structural_error: cfg!(debug_assertions),
        }
    }
}

/// A node chain that does not follow the fixed layering order.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    /// A layer is not a child of the layer above it.
    #[error("{item:?}: {node:?} should be a child of {expected:?} but its parent is {actual:?}")]
    WrongParent {
        /// Item owning the chain.
        item: ItemId,
        /// Misplaced node.
        node: NodeId,
        /// Layer the node should hang under.
        expected: NodeId,
        /// Its actual parent.
        actual: Option<NodeId>,
    },
    /// A layer other than the child container has more or less than one child.
    #[error("{item:?}: intermediate layer {node:?} has {count} children, expected 1")]
    UnexpectedChildCount {
        /// Item owning the chain.
        item: ItemId,
        /// Offending layer.
        node: NodeId,
        /// Its child count.
        count: usize,
    },
    /// The item has no nodes at all.
    #[error("{0:?} has no render nodes")]
    MissingItemNode(ItemId),
}

/// Failure while updating one item.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The item's delegate failed to produce its paint node. The previous
    /// paint node, if any, was kept.
    #[error("paint node update for {item:?} failed")]
    Paint {
        /// Item whose delegate failed.
        item: ItemId,
        /// What the delegate reported.
        #[source]
        source: PaintError,
    },
    /// The layering check failed.
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// Counters for one sync pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Items drained from the dirty list.
    pub items: usize,
    /// Items whose nodes were released at the start of the pass.
    pub released: usize,
    /// Nodes created.
    pub created: usize,
    /// Nodes destroyed.
    pub destroyed: usize,
    /// Nodes inserted into a child list by reconciliation.
    pub inserted: usize,
    /// Nodes removed from a child list by reconciliation.
    pub removed: usize,
    /// Delegate paint-node callbacks made.
    pub paint_updates: usize,
}

/// Outcome of [`SyncEngine::synchronize`].
#[derive(Clone, Debug, Default)]
pub struct SyncReport {
    /// Counters.
    pub stats: SyncStats,
    /// Per-item failures. Other items were still updated.
    pub errors: Vec<SyncError>,
    /// The drained entries, in processing order.
    #[cfg(feature = "trace-rich")]
    pub drained: Vec<DirtyEntry>,
}

impl SyncReport {
    /// Whether the pass finished without errors.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Per-item node chain
// ---------------------------------------------------------------------------

/// The render nodes owned by one item.
///
/// Present layers always nest in this order: `transform`, `opacity`,
/// `clip`, `root`. The innermost present layer is the child container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemNodes {
    owner: ItemId,
    /// The item's transform node. Always present.
    pub transform: NodeId,
    /// Opacity layer.
    pub opacity: Option<NodeId>,
    /// Clip layer.
    pub clip: Option<NodeId>,
    /// Effect root layer.
    pub root: Option<NodeId>,
    /// Content produced by the item's delegate.
    pub paint: Option<NodeId>,
}

impl ItemNodes {
    /// The item these nodes belong to.
    #[must_use]
    pub const fn owner(&self) -> ItemId {
        self.owner
    }

    /// Node that holds the paint node and the children's transform nodes.
    #[must_use]
    pub fn container(&self) -> NodeId {
        self.root
            .or(self.clip)
            .or(self.opacity)
            .unwrap_or(self.transform)
    }

    fn layers(&self) -> impl Iterator<Item = NodeId> {
        [
            Some(self.transform),
            self.opacity,
            self.clip,
            self.root,
            self.paint,
        ]
        .into_iter()
        .flatten()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Reconciles an [`ItemTree`] into a [`NodeGraph`].
#[derive(Debug, Default)]
pub struct SyncEngine {
    config: SyncConfig,
    slots: Vec<Option<ItemNodes>>,
    stats: SyncStats,
    update_requests: Vec<ItemId>,
}

impl SyncEngine {
    /// Creates an engine with no nodes.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> SyncConfig {
        self.config
    }

    /// Nodes currently owned by `item`, if it has been synced.
    #[must_use]
    pub fn item_nodes(&self, item: ItemId) -> Option<&ItemNodes> {
        self.slots
            .get(item.idx as usize)
            .and_then(Option::as_ref)
            .filter(|n| n.owner == item)
    }

    /// Runs one sync pass.
    ///
    /// Releases nodes of items that left the window, then drains the dirty
    /// list and updates every drained item. Items marked dirty while the
    /// pass runs, including by delegates asking for another paint update,
    /// stay queued for the next pass.
    pub fn synchronize(&mut self, tree: &mut ItemTree, graph: &mut NodeGraph) -> SyncReport {
        self.stats = SyncStats::default();
        let mut report = SyncReport::default();

        for item in tree.take_released() {
            self.release(graph, item);
        }

        let entries = tree.drain_dirty();
        self.stats.items = entries.len();
        for entry in &entries {
            if !tree.is_alive(entry.item) {
                continue;
            }
            if let Err(err) = self.update_dirty_node(tree, graph, entry.item, entry.flags) {
                log::error!("sync: {err}");
                report.errors.push(err);
            }
        }

        let root = tree.root();
        if let Some(nodes) = self.item_nodes(root).copied()
            && graph.parent(nodes.transform).is_none()
        {
            graph.append_child(graph.root(), nodes.transform);
        }

        for item in core::mem::take(&mut self.update_requests) {
            if tree.is_alive(item) {
                tree.mark_dirty(item, DirtyFlags::CONTENT);
            }
        }

        report.stats = self.stats;
        #[cfg(feature = "trace-rich")]
        {
            report.drained = entries;
        }
        log::trace!("sync pass: {:?}", report.stats);
        report
    }

    /// Brings one item's node chain up to date with `dirty`.
    ///
    /// Creates the item's transform node on first use. Paint-node update
    /// requests made by the delegate are applied at the end of the next
    /// [`synchronize`](Self::synchronize).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Paint`] when the delegate fails; the chain is
    /// otherwise fully updated and the old paint node kept. Returns
    /// [`SyncError::Structural`] when node verification is on and the chain
    /// is malformed.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale, or on a structural error when
    /// [`SyncConfig::panic_on_structural_error`] is set.
    pub fn update_dirty_node(
        &mut self,
        tree: &mut ItemTree,
        graph: &mut NodeGraph,
        item: ItemId,
        dirty: DirtyFlags,
    ) -> Result<(), SyncError> {
        tree.validate(item);
        let mut n = self.ensure_nodes(graph, item);

        if dirty.intersects(DirtyFlags::TRANSFORM_UPDATE_MASK)
            || (dirty.contains(DirtyFlags::SIZE) && tree.size_affects_transform(item))
        {
            graph.set_matrix(n.transform, tree.local_matrix(item));
        }

        if dirty.intersects(DirtyFlags::CLIP | DirtyFlags::WINDOW)
            && tree.clip(item) != n.clip.is_some()
        {
            self.toggle_clip(tree, graph, item, &mut n);
        }

        if dirty.intersects(DirtyFlags::EFFECT_REFERENCE | DirtyFlags::WINDOW)
            && (tree.effect_ref_count(item) == 0) != n.root.is_none()
        {
            if dirty.intersects(DirtyFlags::CHILDREN_UPDATE_MASK) {
                graph.remove_all_children(n.container());
            }
            self.toggle_effect_root(tree, graph, item, &mut n);
        }

        if dirty.intersects(DirtyFlags::CHILDREN_UPDATE_MASK) {
            self.update_children(tree, graph, item, &n);
        }

        if dirty.contains(DirtyFlags::SIZE)
            && let Some(clip) = n.clip
        {
            graph.set_clip_rect(clip, tree.clip_rect(item));
        }

        if dirty.intersects(DirtyFlags::OPACITY_UPDATE_MASK) {
            self.update_opacity(tree, graph, item, &mut n);
        }

        let content = if dirty.intersects(DirtyFlags::CONTENT_UPDATE_MASK) {
            self.update_content(tree, graph, item, &mut n)
        } else {
            Ok(())
        };

        self.slots[item.idx as usize] = Some(n);
        content?;

        if self.config.verify_nodes
            && let Err(err) = self.verify_item(graph, item)
        {
            if self.config.panic_on_structural_error {
                panic!("malformed node chain: {err}");
            }
            return Err(err.into());
        }
        Ok(())
    }

    /// Checks that `item`'s layers nest in order and that only the child
    /// container has more than one child.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn verify_item(&self, graph: &NodeGraph, item: ItemId) -> Result<(), StructuralError> {
        let n = self
            .item_nodes(item)
            .ok_or(StructuralError::MissingItemNode(item))?;
        let container = n.container();
        let layers: Vec<NodeId> = n.layers().collect();
        for pair in layers.windows(2) {
            let (above, node) = (pair[0], pair[1]);
            let actual = graph.parent(node);
            if actual != Some(above) {
                return Err(StructuralError::WrongParent {
                    item,
                    node,
                    expected: above,
                    actual,
                });
            }
        }
        for &node in &layers {
            if Some(node) == n.paint || node == container {
                continue;
            }
            let count = graph.child_count(node);
            if count != 1 {
                return Err(StructuralError::UnexpectedChildCount { item, node, count });
            }
        }
        Ok(())
    }

    /// Destroys every node this engine created and forgets all items.
    ///
    /// The item tree must be marked with
    /// [`ItemTree::invalidate_scene_graph`] so the next pass rebuilds it.
    pub fn invalidate(&mut self, graph: &mut NodeGraph) {
        self.slots.clear();
        self.update_requests.clear();
        graph.clear();
    }

    // -- Layer splicing --

    fn toggle_clip(&mut self, tree: &ItemTree, graph: &mut NodeGraph, item: ItemId, n: &mut ItemNodes) {
        let parent = n.opacity.unwrap_or(n.transform);
        if tree.clip(item) {
            let clip = graph.create_clip(tree.clip_rect(item));
            self.stats.created += 1;
            match n.root {
                Some(root) => {
                    graph.remove_child(parent, root);
                    graph.append_child(clip, root);
                }
                None => graph.reparent_children_to(parent, clip),
            }
            graph.append_child(parent, clip);
            n.clip = Some(clip);
        } else if let Some(clip) = n.clip.take() {
            graph.remove_child(parent, clip);
            match n.root {
                Some(root) => {
                    graph.remove_child(clip, root);
                    graph.append_child(parent, root);
                }
                None => graph.reparent_children_to(clip, parent),
            }
            graph.destroy(clip);
            self.stats.destroyed += 1;
        }
    }

    fn toggle_effect_root(
        &mut self,
        tree: &ItemTree,
        graph: &mut NodeGraph,
        item: ItemId,
        n: &mut ItemNodes,
    ) {
        let parent = n.clip.or(n.opacity).unwrap_or(n.transform);
        if tree.effect_ref_count(item) > 0 {
            let root = graph.create_effect_root();
            self.stats.created += 1;
            graph.reparent_children_to(parent, root);
            graph.append_child(parent, root);
            n.root = Some(root);
        } else if let Some(root) = n.root.take() {
            graph.remove_child(parent, root);
            graph.reparent_children_to(root, parent);
            graph.destroy(root);
            self.stats.destroyed += 1;
        }
    }

    fn update_opacity(&mut self, tree: &ItemTree, graph: &mut NodeGraph, item: ItemId, n: &mut ItemNodes) {
        let opacity = tree.effective_opacity(item);
        if opacity != 1.0 && n.opacity.is_none() {
            let node = graph.create_opacity(opacity);
            self.stats.created += 1;
            match n.clip.or(n.root) {
                Some(child) => {
                    graph.remove_child(n.transform, child);
                    graph.append_child(node, child);
                }
                None => graph.reparent_children_to(n.transform, node),
            }
            graph.append_child(n.transform, node);
            n.opacity = Some(node);
        }
        if let Some(node) = n.opacity {
            graph.set_opacity(node, opacity);
        }
    }

    // -- Child list --

    /// Patches the container's child list to: contributing children with
    /// negative z, the paint node, the remaining contributing children.
    fn update_children(&mut self, tree: &ItemTree, graph: &mut NodeGraph, item: ItemId, n: &ItemNodes) {
        let container = n.container();
        let mut desired = Vec::new();
        let mut paint_placed = false;
        for child in tree.paint_order_children(item) {
            if !tree.contributes_node(child) {
                continue;
            }
            if !paint_placed && !(tree.z(child) < 0.0) {
                desired.extend(n.paint);
                paint_placed = true;
            }
            desired.push(self.ensure_nodes(graph, child).transform);
        }
        if !paint_placed {
            desired.extend(n.paint);
        }

        let mut wanted = desired.into_iter();
        let mut current = graph.first_child(container);
        while let Some(cur) = current {
            let Some(want) = wanted.next() else {
                break;
            };
            if cur != want {
                if graph.next_sibling(cur) == Some(want) {
                    graph.remove_child(container, cur);
                    self.stats.removed += 1;
                } else {
                    graph.detach(want);
                    graph.insert_before(container, want, cur);
                    self.stats.inserted += 1;
                }
            }
            current = graph.next_sibling(want);
        }
        while let Some(cur) = current {
            current = graph.next_sibling(cur);
            graph.remove_child(container, cur);
            self.stats.removed += 1;
        }
        for want in wanted {
            graph.detach(want);
            graph.append_child(container, want);
            self.stats.inserted += 1;
        }
    }

    // -- Paint node --

    fn update_content(
        &mut self,
        tree: &mut ItemTree,
        graph: &mut NodeGraph,
        item: ItemId,
        n: &mut ItemNodes,
    ) -> Result<(), SyncError> {
        if !tree.flags(item).contains(ItemFlags::HAS_CONTENTS) {
            if let Some(old) = n.paint.take() {
                self.destroy_node(graph, old);
            }
            return Ok(());
        }
        let previous = n.paint;
        let Some((result, requested)) = tree.lend_delegate(item, |tree, delegate| {
            let mut ctx = PaintNodeContext {
                item,
                tree: &*tree,
                graph: &mut *graph,
                update_requested: false,
            };
            let result = delegate.update_paint_node(previous, &mut ctx);
            (result, ctx.update_requested)
        }) else {
            return Ok(());
        };
        self.stats.paint_updates += 1;
        if requested {
            self.update_requests.push(item);
        }

        let produced = result.map_err(|source| SyncError::Paint { item, source })?;
        if let Some(node) = produced
            && !(graph.is_alive(node) && matches!(graph.kind(node), NodeKind::Paint(_)))
        {
            return Err(SyncError::Paint {
                item,
                source: PaintError::NotAPaintNode(node),
            });
        }
        if produced != previous
            && let Some(old) = previous
        {
            self.destroy_node(graph, old);
        }
        n.paint = produced;

        if let Some(paint) = produced
            && graph.parent(paint).is_none()
        {
            let container = n.container();
            match self.last_negative_child(tree, graph, item, container) {
                Some(before) => graph.insert_after(container, paint, before),
                None => graph.prepend_child(container, paint),
            }
        }
        Ok(())
    }

    /// Transform node of the last contributing child with negative z that
    /// is already in `container`.
    fn last_negative_child(
        &self,
        tree: &ItemTree,
        graph: &NodeGraph,
        item: ItemId,
        container: NodeId,
    ) -> Option<NodeId> {
        tree.paint_order_children(item)
            .into_iter()
            .take_while(|&c| tree.z(c) < 0.0)
            .filter(|&c| tree.contributes_node(c))
            .filter_map(|c| self.item_nodes(c).map(|n| n.transform))
            .filter(|&t| graph.parent(t) == Some(container))
            .last()
    }

    // -- Slot bookkeeping --

    fn ensure_nodes(&mut self, graph: &mut NodeGraph, item: ItemId) -> ItemNodes {
        let i = item.idx as usize;
        if self.slots.len() <= i {
            self.slots.resize(i + 1, None);
        }
        let existing = self.slots[i];
        match existing {
            Some(n) if n.owner == item => n,
            stale => {
                if let Some(old) = stale {
                    self.destroy_chain(graph, old);
                }
                let n = ItemNodes {
                    owner: item,
                    transform: graph.create_transform(Transform3d::IDENTITY),
                    opacity: None,
                    clip: None,
                    root: None,
                    paint: None,
                };
                self.stats.created += 1;
                self.slots[i] = Some(n);
                n
            }
        }
    }

    fn release(&mut self, graph: &mut NodeGraph, item: ItemId) {
        let Some(slot) = self.slots.get_mut(item.idx as usize) else {
            return;
        };
        if let Some(n) = (*slot).filter(|n| n.owner == item) {
            *slot = None;
            self.destroy_chain(graph, n);
            self.stats.released += 1;
        }
    }

    fn destroy_chain(&mut self, graph: &mut NodeGraph, n: ItemNodes) {
        for node in [n.paint, n.root, n.clip, n.opacity, Some(n.transform)]
            .into_iter()
            .flatten()
        {
            self.destroy_node(graph, node);
        }
    }

    fn destroy_node(&mut self, graph: &mut NodeGraph, node: NodeId) {
        if graph.is_alive(node) {
            graph.destroy(node);
            self.stats.destroyed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::vec;

    use kurbo::{Point, Size};

    use super::*;
    use crate::item::ItemDelegate;
    use crate::node::{ContentKey, PaintContent};

    struct Solid;

    impl ItemDelegate for Solid {
        fn update_paint_node(
            &mut self,
            previous: Option<NodeId>,
            ctx: &mut PaintNodeContext<'_>,
        ) -> Result<Option<NodeId>, PaintError> {
            let content = PaintContent {
                bounds: ctx.bounds(),
                key: ContentKey(7),
                smooth: true,
            };
            Ok(Some(match previous {
                Some(p) => {
                    ctx.graph().set_paint_content(p, content);
                    p
                }
                None => ctx.graph().create_paint(content),
            }))
        }
    }

    fn setup() -> (ItemTree, NodeGraph, SyncEngine) {
        let config = SyncConfig {
            verify_nodes: true,
            panic_on_structural_error: false,
        };
        (ItemTree::new(), NodeGraph::new(), SyncEngine::new(config))
    }

    fn child(tree: &mut ItemTree) -> ItemId {
        let id = tree.create_item();
        let root = tree.root();
        tree.add_child(root, id);
        id
    }

    #[test]
    fn first_pass_attaches_root_under_graph_root() {
        let (mut tree, mut graph, mut engine) = setup();
        let report = engine.synchronize(&mut tree, &mut graph);
        assert!(report.is_ok());
        let nodes = engine.item_nodes(tree.root()).copied();
        let nodes = nodes.map(|n| n.transform);
        assert_eq!(nodes, graph.first_child(graph.root()));
    }

    #[test]
    fn clip_wraps_existing_children() {
        let (mut tree, mut graph, mut engine) = setup();
        let a = child(&mut tree);
        let b = tree.create_item();
        tree.add_child(a, b);
        tree.set_size(a, Size::new(10.0, 20.0));
        let _ = engine.synchronize(&mut tree, &mut graph);

        tree.set_clip(a, true);
        let report = engine.synchronize(&mut tree, &mut graph);
        assert!(report.is_ok(), "{:?}", report.errors);
        let n = engine.item_nodes(a).copied().unwrap();
        let clip = n.clip.unwrap();
        assert_eq!(graph.parent(clip), Some(n.transform));
        let bt = engine.item_nodes(b).unwrap().transform;
        assert_eq!(graph.parent(bt), Some(clip));
        assert_eq!(graph.clip_rect(clip), Some(kurbo::Rect::new(0.0, 0.0, 10.0, 20.0)));

        tree.set_clip(a, false);
        let _ = engine.synchronize(&mut tree, &mut graph);
        let n = engine.item_nodes(a).copied().unwrap();
        assert!(n.clip.is_none());
        assert!(!graph.is_alive(clip));
        assert_eq!(graph.parent(bt), Some(n.transform));
    }

    #[test]
    fn paint_node_sits_between_negative_and_positive_children() {
        let (mut tree, mut graph, mut engine) = setup();
        let a = child(&mut tree);
        tree.set_delegate(a, Box::new(Solid));
        tree.set_flags(a, ItemFlags::HAS_CONTENTS);
        let below = tree.create_item();
        let above = tree.create_item();
        tree.add_child(a, above);
        tree.add_child(a, below);
        tree.set_z(below, -1.0);
        let report = engine.synchronize(&mut tree, &mut graph);
        assert!(report.is_ok(), "{:?}", report.errors);

        let n = engine.item_nodes(a).copied().unwrap();
        let kids: Vec<NodeId> = graph.children(n.container()).collect();
        assert_eq!(
            kids,
            vec![
                engine.item_nodes(below).unwrap().transform,
                n.paint.unwrap(),
                engine.item_nodes(above).unwrap().transform,
            ]
        );
    }

    #[test]
    fn dropping_has_contents_destroys_paint_node() {
        let (mut tree, mut graph, mut engine) = setup();
        let a = child(&mut tree);
        tree.set_delegate(a, Box::new(Solid));
        tree.set_flags(a, ItemFlags::HAS_CONTENTS);
        let _ = engine.synchronize(&mut tree, &mut graph);
        let paint = engine.item_nodes(a).unwrap().paint.unwrap();

        tree.set_flags(a, ItemFlags::empty());
        let _ = engine.synchronize(&mut tree, &mut graph);
        assert!(!graph.is_alive(paint));
        assert_eq!(engine.item_nodes(a).unwrap().paint, None);
    }

    #[test]
    fn failing_delegate_keeps_previous_paint_node() {
        struct Flaky(bool);
        impl ItemDelegate for Flaky {
            fn update_paint_node(
                &mut self,
                previous: Option<NodeId>,
                ctx: &mut PaintNodeContext<'_>,
            ) -> Result<Option<NodeId>, PaintError> {
                if self.0 {
                    return Err(PaintError::Failed("out of glyphs".into()));
                }
                self.0 = true;
                Solid.update_paint_node(previous, ctx)
            }
        }

        let (mut tree, mut graph, mut engine) = setup();
        let a = child(&mut tree);
        tree.set_delegate(a, Box::new(Flaky(false)));
        tree.set_flags(a, ItemFlags::HAS_CONTENTS);
        let _ = engine.synchronize(&mut tree, &mut graph);
        let paint = engine.item_nodes(a).unwrap().paint;

        tree.update(a);
        tree.set_position(a, Point::new(3.0, 4.0));
        let report = engine.synchronize(&mut tree, &mut graph);
        assert!(matches!(
            report.errors.as_slice(),
            [SyncError::Paint { item, .. }] if *item == a
        ));
        assert_eq!(engine.item_nodes(a).unwrap().paint, paint);
        let m = graph.matrix(engine.item_nodes(a).unwrap().transform).unwrap();
        assert_eq!(m.translation_2d(), (3.0, 4.0));
    }

    #[test]
    fn removed_items_release_nodes_on_next_pass() {
        let (mut tree, mut graph, mut engine) = setup();
        let a = child(&mut tree);
        let _ = engine.synchronize(&mut tree, &mut graph);
        let t = engine.item_nodes(a).unwrap().transform;

        tree.remove_from_parent(a);
        assert!(graph.is_alive(t), "release is deferred to sync");
        let report = engine.synchronize(&mut tree, &mut graph);
        assert_eq!(report.stats.released, 1);
        assert!(!graph.is_alive(t));
        assert!(engine.item_nodes(a).is_none());
    }

    #[test]
    fn verify_reports_misplaced_layer() {
        let (mut tree, mut graph, mut engine) = setup();
        let a = child(&mut tree);
        tree.set_opacity(a, 0.5);
        let _ = engine.synchronize(&mut tree, &mut graph);
        let n = engine.item_nodes(a).copied().unwrap();
        let op = n.opacity.unwrap();
        graph.detach(op);
        assert!(matches!(
            engine.verify_item(&graph, a),
            Err(StructuralError::WrongParent { node, .. }) if node == op
        ));
    }

    #[test]
    fn invalidate_rebuilds_everything() {
        let (mut tree, mut graph, mut engine) = setup();
        let a = child(&mut tree);
        tree.set_opacity(a, 0.25);
        let _ = engine.synchronize(&mut tree, &mut graph);

        engine.invalidate(&mut graph);
        tree.invalidate_scene_graph();
        assert_eq!(graph.node_count(), 1);
        let report = engine.synchronize(&mut tree, &mut graph);
        assert!(report.is_ok());
        let op = engine.item_nodes(a).unwrap().opacity.unwrap();
        assert_eq!(graph.opacity(op), Some(0.25));
    }
}
