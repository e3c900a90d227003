// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Spatial damage tracking for partial re-rendering.

use alloc::vec::Vec;

use arbor_core::node::{NodeDirtyFlags, NodeId};
use kurbo::Rect;

use crate::plan::RenderPlan;

/// A region of the window that needs re-rendering.
///
/// Backends can use this to minimize GPU work by only redrawing areas
/// that changed since the last frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum DamageRegion {
    /// The entire window needs redrawing.
    #[default]
    Full,
    /// A list of window-space rectangles that need redrawing.
    Rects(Vec<Rect>),
    /// Nothing changed; the previous frame can be reused.
    None,
}

impl DamageRegion {
    /// Derives the damage of a frame from the node changes collected with
    /// [`NodeGraph::take_dirty`](arbor_core::node::NodeGraph::take_dirty).
    ///
    /// Content-only changes damage the old and new bounds of the paint
    /// nodes involved. Any structural change (a node added or removed, a
    /// matrix, clip or opacity update) damages the whole window.
    #[must_use]
    pub fn from_changes(
        changes: &[(NodeId, NodeDirtyFlags)],
        previous: &RenderPlan,
        current: &RenderPlan,
    ) -> Self {
        if changes.is_empty() {
            return Self::None;
        }
        if changes.iter().any(|(_, f)| *f != NodeDirtyFlags::PAINT) {
            return Self::Full;
        }
        let mut rects = Vec::new();
        for (node, _) in changes {
            for plan in [previous, current] {
                rects.extend(
                    plan.items
                        .iter()
                        .filter(|i| i.node == *node)
                        .map(|i| i.world_bounds())
                        .filter(|r| !r.is_zero_area()),
                );
            }
        }
        if rects.is_empty() {
            Self::None
        } else {
            Self::Rects(rects)
        }
    }

    /// Returns `true` if no region needs redrawing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Merges another damage region into this one.
    pub fn merge(&mut self, other: &Self) {
        match (&*self, other) {
            (Self::Full, _) | (_, Self::Full) => *self = Self::Full,
            (Self::None, _) => *self = other.clone(),
            (_, Self::None) => {}
            (Self::Rects(a), Self::Rects(b)) => {
                let mut merged = a.clone();
                merged.extend_from_slice(b);
                *self = Self::Rects(merged);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use arbor_core::node::{ContentKey, NodeGraph, PaintContent};
    use arbor_core::transform::Transform3d;
    use arbor_core::window::WindowId;

    use super::*;

    #[test]
    fn content_change_damages_node_bounds() {
        let mut graph = NodeGraph::new();
        let t = graph.create_transform(Transform3d::from_translation(20.0, 0.0, 0.0));
        let content = PaintContent {
            bounds: Rect::new(0.0, 0.0, 5.0, 5.0),
            key: ContentKey(1),
            smooth: true,
        };
        let p = graph.create_paint(content);
        graph.append_child(graph.root(), t);
        graph.append_child(t, p);
        let before = RenderPlan::build(&graph, WindowId(0));
        let _ = graph.take_dirty();

        graph.set_paint_content(p, PaintContent {
            key: ContentKey(2),
            ..content
        });
        let after = RenderPlan::build(&graph, WindowId(0));
        let damage = DamageRegion::from_changes(&graph.take_dirty(), &before, &after);
        assert_eq!(
            damage,
            DamageRegion::Rects(vec![
                Rect::new(20.0, 0.0, 25.0, 5.0),
                Rect::new(20.0, 0.0, 25.0, 5.0)
            ])
        );
    }

    #[test]
    fn structural_change_damages_everything() {
        let mut graph = NodeGraph::new();
        let t = graph.create_transform(Transform3d::IDENTITY);
        graph.append_child(graph.root(), t);
        let plan = RenderPlan::build(&graph, WindowId(0));
        let damage = DamageRegion::from_changes(&graph.take_dirty(), &plan, &plan);
        assert_eq!(damage, DamageRegion::Full);
        assert_eq!(
            DamageRegion::from_changes(&[], &plan, &plan),
            DamageRegion::None
        );
    }

    #[test]
    fn merge_escalates_to_full() {
        let mut d = DamageRegion::None;
        d.merge(&DamageRegion::Rects(vec![Rect::new(0.0, 0.0, 1.0, 1.0)]));
        assert!(matches!(d, DamageRegion::Rects(ref r) if r.len() == 1));
        d.merge(&DamageRegion::Full);
        assert_eq!(d, DamageRegion::Full);
    }
}
