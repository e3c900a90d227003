// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end reconciliation scenarios through the public API.

use arbor_core::item::{ItemDelegate, ItemFlags, ItemId, ItemTree, PaintNodeContext};
use arbor_core::node::{ContentKey, NodeGraph, NodeId, NodeKind, PaintContent, PaintError};
use arbor_core::sync::{SyncConfig, SyncEngine};
use kurbo::{Point, Rect, Size};

/// Paints a solid box the size of the item.
struct Panel {
    key: u64,
    again: bool,
}

impl Panel {
    fn boxed(key: u64) -> Box<Self> {
        Box::new(Self { key, again: false })
    }
}

impl ItemDelegate for Panel {
    fn update_paint_node(
        &mut self,
        previous: Option<NodeId>,
        ctx: &mut PaintNodeContext<'_>,
    ) -> Result<Option<NodeId>, PaintError> {
        let content = PaintContent {
            bounds: ctx.bounds(),
            key: ContentKey(self.key),
            smooth: true,
        };
        if self.again {
            ctx.request_update();
        }
        Ok(Some(match previous {
            Some(node) => {
                ctx.graph().set_paint_content(node, content);
                node
            }
            None => ctx.graph().create_paint(content),
        }))
    }
}

struct Fixture {
    tree: ItemTree,
    graph: NodeGraph,
    engine: SyncEngine,
}

impl Fixture {
    fn new() -> Self {
        let mut tree = ItemTree::new();
        let root = tree.root();
        tree.set_size(root, Size::new(800.0, 600.0));
        Self {
            tree,
            graph: NodeGraph::new(),
            engine: SyncEngine::new(SyncConfig {
                verify_nodes: true,
                panic_on_structural_error: true,
            }),
        }
    }

    fn painted_child(&mut self, parent: ItemId, key: u64) -> ItemId {
        let id = self.tree.create_item_with(Panel::boxed(key));
        self.tree.set_flags(id, ItemFlags::HAS_CONTENTS);
        self.tree.add_child(parent, id);
        id
    }

    fn plain_child(&mut self, parent: ItemId) -> ItemId {
        let id = self.tree.create_item();
        self.tree.add_child(parent, id);
        id
    }

    fn sync(&mut self) -> arbor_core::sync::SyncReport {
        let report = self.engine.synchronize(&mut self.tree, &mut self.graph);
        assert!(report.is_ok(), "{:?}", report.errors);
        report
    }

    fn transform(&self, item: ItemId) -> NodeId {
        self.engine.item_nodes(item).expect("synced").transform
    }

    fn container_children(&self, item: ItemId) -> Vec<NodeId> {
        let nodes = self.engine.item_nodes(item).expect("synced");
        self.graph.children(nodes.container()).collect()
    }

    /// Kinds along the single-child chain from the item's transform node
    /// down to its container.
    fn chain(&self, item: ItemId) -> Vec<&'static str> {
        let nodes = self.engine.item_nodes(item).expect("synced");
        let container = nodes.container();
        let mut out = Vec::new();
        let mut node = nodes.transform;
        loop {
            out.push(match self.graph.kind(node) {
                NodeKind::Root => "root",
                NodeKind::Transform { .. } => "transform",
                NodeKind::Opacity { .. } => "opacity",
                NodeKind::Clip { .. } => "clip",
                NodeKind::EffectRoot => "effect",
                NodeKind::Paint(_) => "paint",
            });
            if node == container {
                break;
            }
            node = self.graph.first_child(node).expect("layer has a child");
        }
        out
    }
}

#[test]
fn opacity_clip_and_visibility_scenario() {
    let mut f = Fixture::new();
    let root = f.tree.root();
    let a = f.painted_child(root, 1);
    f.tree.set_position(a, Point::new(10.0, 10.0));
    f.tree.set_size(a, Size::new(100.0, 50.0));
    f.tree.set_opacity(a, 0.5);
    f.sync();

    let nodes = *f.engine.item_nodes(a).expect("synced");
    let opacity = nodes.opacity.expect("opacity layer");
    assert_eq!(f.graph.opacity(opacity), Some(0.5));
    assert_eq!(f.graph.matrix(nodes.transform).map(|m| m.translation_2d()), Some((10.0, 10.0)));
    assert_eq!(f.chain(a), ["transform", "opacity"]);

    f.tree.set_clip(a, true);
    f.sync();
    let nodes = *f.engine.item_nodes(a).expect("synced");
    let clip = nodes.clip.expect("clip layer");
    assert_eq!(f.chain(a), ["transform", "opacity", "clip"]);
    assert_eq!(f.graph.parent(clip), Some(opacity));
    assert_eq!(f.graph.parent(nodes.paint.expect("paint")), Some(clip));
    assert_eq!(f.graph.clip_rect(clip), Some(Rect::new(0.0, 0.0, 100.0, 50.0)));

    f.tree.set_visible(a, false);
    f.sync();
    let nodes = *f.engine.item_nodes(a).expect("synced");
    assert_eq!(nodes.opacity, Some(opacity), "opacity layer is kept");
    assert_eq!(f.graph.opacity(opacity), Some(0.0));
}

#[test]
fn effect_root_nests_innermost_and_collapses_cleanly() {
    let mut f = Fixture::new();
    let root = f.tree.root();
    let a = f.painted_child(root, 1);
    let kid = f.plain_child(a);
    f.tree.set_size(a, Size::new(40.0, 40.0));
    f.tree.set_clip(a, true);
    f.tree.set_opacity(a, 0.75);
    f.tree.ref_from_effect(a, false);
    f.sync();

    assert_eq!(f.chain(a), ["transform", "opacity", "clip", "effect"]);
    let nodes = *f.engine.item_nodes(a).expect("synced");
    let effect = nodes.root.expect("effect root");
    assert_eq!(
        f.container_children(a),
        [nodes.paint.expect("paint"), f.transform(kid)]
    );

    f.tree.deref_from_effect(a, false);
    f.sync();
    assert_eq!(f.chain(a), ["transform", "opacity", "clip"]);
    assert!(!f.graph.is_alive(effect));
    assert_eq!(
        f.container_children(a),
        [nodes.paint.expect("paint"), f.transform(kid)]
    );
    f.engine.verify_item(&f.graph, a).expect("well formed");
}

#[test]
fn sibling_reorder_moves_exactly_one_node() {
    let mut f = Fixture::new();
    let root = f.tree.root();
    let p = f.plain_child(root);
    let a = f.plain_child(p);
    let b = f.plain_child(p);
    let c = f.plain_child(p);
    f.sync();
    let (ta, tb, tc) = (f.transform(a), f.transform(b), f.transform(c));
    assert_eq!(f.container_children(p), [ta, tb, tc]);

    // Moving b to the end of the same parent keeps it inside the window.
    f.tree.reparent(b, p);
    let report = f.sync();

    assert_eq!(f.container_children(p), [ta, tc, tb]);
    assert_eq!((f.transform(a), f.transform(b), f.transform(c)), (ta, tb, tc));
    assert_eq!(report.stats.created, 0);
    assert_eq!(report.stats.destroyed, 0);
    assert_eq!(report.stats.removed, 1);
    assert_eq!(report.stats.inserted, 1);
}

#[test]
fn z_order_and_visibility_shape_the_child_list() {
    let mut f = Fixture::new();
    let root = f.tree.root();
    let p = f.painted_child(root, 9);
    let a = f.plain_child(p);
    let b = f.plain_child(p);
    let c = f.plain_child(p);
    f.sync();
    let paint = f.engine.item_nodes(p).and_then(|n| n.paint).expect("paint");
    let (ta, tb, tc) = (f.transform(a), f.transform(b), f.transform(c));
    assert_eq!(f.container_children(p), [paint, ta, tb, tc]);

    f.tree.set_z(c, -1.0);
    f.tree.set_z(a, 5.0);
    f.sync();
    assert_eq!(f.container_children(p), [tc, paint, tb, ta]);

    f.tree.set_visible(b, false);
    f.sync();
    assert_eq!(f.container_children(p), [tc, paint, ta]);
    assert!(f.graph.is_alive(tb), "invisible items keep their nodes");

    // An effect keeps an invisible item in its parent's list.
    f.tree.ref_from_effect(b, false);
    f.sync();
    assert_eq!(f.container_children(p), [tc, paint, tb, ta]);
}

#[test]
fn redirty_during_sync_waits_for_next_pass() {
    let mut f = Fixture::new();
    let root = f.tree.root();
    let a = f.tree.create_item_with(Box::new(Panel {
        key: 3,
        again: true,
    }));
    f.tree.set_flags(a, ItemFlags::HAS_CONTENTS);
    f.tree.add_child(root, a);

    let first = f.sync();
    assert_eq!(first.stats.paint_updates, 1);
    assert!(f.tree.is_queued(a));

    let second = f.sync();
    assert_eq!(second.stats.paint_updates, 1);
    assert_eq!(second.stats.items, 1);
}

#[test]
fn repeated_marks_drain_once() {
    let mut tree = ItemTree::new();
    let root = tree.root();
    let a = tree.create_item();
    tree.add_child(root, a);
    let _ = tree.drain_dirty();
    for _ in 0..10 {
        tree.set_opacity(a, 0.3);
        tree.update(root);
        tree.mark_dirty(a, arbor_core::dirty::DirtyFlags::OPACITY_VALUE);
    }
    let drained = tree.drain_dirty();
    assert_eq!(drained.iter().filter(|e| e.item == a).count(), 1);
}

#[test]
fn subtree_removal_and_readdition() {
    let mut f = Fixture::new();
    let root = f.tree.root();
    let p = f.plain_child(root);
    let kid = f.painted_child(p, 4);
    f.sync();
    let old = f.transform(kid);

    f.tree.remove_from_parent(p);
    f.sync();
    assert!(!f.graph.is_alive(old));
    assert!(f.engine.item_nodes(kid).is_none());
    assert!(f.container_children(root).is_empty());

    f.tree.add_child(root, p);
    f.sync();
    assert_eq!(f.container_children(root), [f.transform(p)]);
    let nodes = *f.engine.item_nodes(kid).expect("rebuilt");
    assert!(nodes.paint.is_some());
}
