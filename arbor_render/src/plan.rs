// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render plan: an ordered sequence of draw items for one frame.

use alloc::vec::Vec;

use arbor_core::node::{ContentKey, NodeGraph, NodeId, NodeKind, PaintContent};
use arbor_core::transform::Transform3d;
use arbor_core::window::WindowId;
use kurbo::Rect;

/// A single draw command in the render plan.
///
/// Items are produced in back-to-front order, matching the node graph's
/// child order.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderItem {
    /// The paint node this item originates from.
    pub node: NodeId,
    /// What to draw.
    pub content: PaintContent,
    /// Content-to-window transform.
    pub world_transform: Transform3d,
    /// Product of every opacity layer above the node.
    pub effective_opacity: f64,
    /// Window-space bounding box of every clip layer above the node,
    /// intersected. `None` when unclipped.
    pub clip: Option<Rect>,
}

impl RenderItem {
    /// Key of the content to draw.
    #[must_use]
    pub const fn key(&self) -> ContentKey {
        self.content.key
    }

    /// Window-space bounding box of the content, clipped.
    #[must_use]
    pub fn world_bounds(&self) -> Rect {
        let bounds = self
            .world_transform
            .to_affine()
            .transform_rect_bbox(self.content.bounds);
        match self.clip {
            Some(clip) => bounds.intersect(clip),
            None => bounds,
        }
    }
}

/// An ordered list of draw commands for a single frame of a single window.
#[derive(Clone, Debug, Default)]
pub struct RenderPlan {
    /// Target window for this plan.
    pub window: WindowId,
    /// Draw items in back-to-front order.
    pub items: Vec<RenderItem>,
}

#[derive(Clone, Copy)]
struct Accum {
    matrix: Transform3d,
    opacity: f64,
    clip: Option<Rect>,
}

impl RenderPlan {
    /// Creates an empty render plan for the given window.
    #[must_use]
    pub fn new(window: WindowId) -> Self {
        Self {
            window,
            items: Vec::new(),
        }
    }

    /// Walks the whole graph from its root.
    #[must_use]
    pub fn build(graph: &NodeGraph, window: WindowId) -> Self {
        Self::build_subtree(graph, graph.root(), window)
    }

    /// Walks the subtree below `node` as if it were the root, ignoring
    /// every layer above it.
    ///
    /// Used to render an item's effect root on its own, for example as an
    /// effect source.
    #[must_use]
    pub fn build_subtree(graph: &NodeGraph, node: NodeId, window: WindowId) -> Self {
        let mut plan = Self::new(window);
        let start = Accum {
            matrix: Transform3d::IDENTITY,
            opacity: 1.0,
            clip: None,
        };
        plan.visit(graph, node, start);
        plan
    }

    /// Clears the plan for reuse.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Number of draw items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the plan draws nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn visit(&mut self, graph: &NodeGraph, node: NodeId, mut acc: Accum) {
        match *graph.kind(node) {
            NodeKind::Root | NodeKind::EffectRoot => {}
            NodeKind::Transform { matrix } => acc.matrix = acc.matrix * matrix,
            NodeKind::Opacity { opacity } => {
                acc.opacity *= opacity;
                // Fully transparent subtrees draw nothing.
                if acc.opacity <= 0.0 {
                    return;
                }
            }
            NodeKind::Clip { rect } => {
                let world = acc.matrix.to_affine().transform_rect_bbox(rect);
                let clip = match acc.clip {
                    Some(outer) => outer.intersect(world),
                    None => world,
                };
                if clip.is_zero_area() {
                    return;
                }
                acc.clip = Some(clip);
            }
            NodeKind::Paint(content) => self.items.push(RenderItem {
                node,
                content,
                world_transform: acc.matrix,
                effective_opacity: acc.opacity,
                clip: acc.clip,
            }),
        }
        for child in graph.children(node) {
            self.visit(graph, child, acc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paint(graph: &mut NodeGraph, key: u64) -> NodeId {
        graph.create_paint(PaintContent {
            bounds: Rect::new(0.0, 0.0, 10.0, 10.0),
            key: ContentKey(key),
            smooth: true,
        })
    }

    #[test]
    fn accumulates_along_the_chain() {
        let mut graph = NodeGraph::new();
        let t = graph.create_transform(Transform3d::from_translation(5.0, 5.0, 0.0));
        let o = graph.create_opacity(0.5);
        let c = graph.create_clip(Rect::new(0.0, 0.0, 4.0, 4.0));
        let p = paint(&mut graph, 1);
        graph.append_child(graph.root(), t);
        graph.append_child(t, o);
        graph.append_child(o, c);
        graph.append_child(c, p);

        let plan = RenderPlan::build(&graph, WindowId(0));
        assert_eq!(plan.len(), 1);
        let item = &plan.items[0];
        assert_eq!(item.effective_opacity, 0.5);
        assert_eq!(item.clip, Some(Rect::new(5.0, 5.0, 9.0, 9.0)));
        assert_eq!(item.world_bounds(), Rect::new(5.0, 5.0, 9.0, 9.0));
    }

    #[test]
    fn transparent_subtrees_are_skipped() {
        let mut graph = NodeGraph::new();
        let o = graph.create_opacity(0.0);
        let p = paint(&mut graph, 1);
        let q = paint(&mut graph, 2);
        graph.append_child(graph.root(), o);
        graph.append_child(o, p);
        graph.append_child(graph.root(), q);

        let plan = RenderPlan::build(&graph, WindowId(0));
        let keys: Vec<_> = plan.items.iter().map(RenderItem::key).collect();
        assert_eq!(keys, [ContentKey(2)]);
    }

    #[test]
    fn subtree_ignores_layers_above() {
        let mut graph = NodeGraph::new();
        let o = graph.create_opacity(0.0);
        let root = graph.create_effect_root();
        let p = paint(&mut graph, 3);
        graph.append_child(graph.root(), o);
        graph.append_child(o, root);
        graph.append_child(root, p);

        assert!(RenderPlan::build(&graph, WindowId(0)).is_empty());
        let detached = RenderPlan::build_subtree(&graph, root, WindowId(0));
        assert_eq!(detached.len(), 1);
        assert_eq!(detached.items[0].effective_opacity, 1.0);
    }
}
