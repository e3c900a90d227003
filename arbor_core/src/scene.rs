// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-window state, split by owning thread.
//!
//! [`Scene`] is what the GUI thread mutates: the item tree, delivery state
//! and window geometry. [`SceneGraph`] is what the renderer reads: the node
//! graph and the sync engine's back-references. Sync is the only operation
//! that touches both, and render loops make sure it runs while nothing else
//! does.

use kurbo::Size;

use crate::delivery::{DeliveryAgent, KeyEvent, PointerEvent};
use crate::item::{ItemId, ItemTree};
use crate::node::NodeGraph;
use crate::polish::PolishReport;
use crate::sync::{SyncConfig, SyncEngine, SyncReport};
use crate::window::WindowId;

/// GUI-side state of one window.
#[derive(Debug)]
pub struct Scene {
    /// The item tree.
    pub items: ItemTree,
    /// Grab, hover and focus state.
    pub delivery: DeliveryAgent,
    window: WindowId,
    size: Size,
    exposed: bool,
    update_requested: bool,
}

impl Scene {
    /// Creates a hidden, zero-sized scene holding only the content root.
    #[must_use]
    pub fn new(window: WindowId) -> Self {
        Self {
            items: ItemTree::new(),
            delivery: DeliveryAgent::new(),
            window,
            size: Size::ZERO,
            exposed: false,
            update_requested: false,
        }
    }

    /// The window this scene belongs to.
    #[must_use]
    pub const fn window(&self) -> WindowId {
        self.window
    }

    /// Window size in logical pixels.
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Resizes the window. The content root follows the window size.
    pub fn set_size(&mut self, size: Size) {
        self.size = size;
        let root = self.items.root();
        self.items.set_size(root, size);
    }

    /// Whether the window is shown on screen.
    #[must_use]
    pub const fn is_exposed(&self) -> bool {
        self.exposed
    }

    /// Marks the window shown or hidden.
    pub fn set_exposed(&mut self, exposed: bool) {
        self.exposed = exposed;
    }

    /// Whether a frame can be rendered: exposed with a non-empty size.
    #[must_use]
    pub fn is_renderable(&self) -> bool {
        self.exposed && self.size.width > 0.0 && self.size.height > 0.0
    }

    /// Requests a frame even if nothing is dirty.
    pub fn request_update(&mut self) {
        self.update_requested = true;
    }

    /// Whether the next frame has work: dirty items, pending polish,
    /// released nodes or an explicit request.
    #[must_use]
    pub fn needs_frame(&self) -> bool {
        self.update_requested || self.items.has_pending_work()
    }

    /// Runs the polish pass.
    pub fn polish(&mut self, loop_limit: usize) -> PolishReport {
        self.items.polish_items(loop_limit)
    }

    /// Delivers a pointer event. Returns the item that accepted it.
    pub fn deliver_pointer(&mut self, event: &PointerEvent) -> Option<ItemId> {
        self.delivery.deliver_pointer(&mut self.items, event)
    }

    /// Delivers a key event to the focus chain. Returns the item that
    /// accepted it.
    pub fn deliver_key(&mut self, event: &KeyEvent) -> Option<ItemId> {
        self.delivery.deliver_key(&mut self.items, event)
    }

    /// Destroys an item and drops any grab, hover or focus it held.
    pub fn destroy_item(&mut self, item: ItemId) {
        self.delivery.forget_item(item);
        self.items.destroy_item(item);
        // Descendants went with it.
        self.delivery.prune(&self.items);
    }

    /// Clears the explicit frame request. Called by render loops when a
    /// frame starts.
    pub fn begin_frame(&mut self) {
        self.update_requested = false;
    }
}

/// Render-side state of one window.
#[derive(Debug, Default)]
pub struct SceneGraph {
    /// The node graph renderers walk.
    pub nodes: NodeGraph,
    /// The engine that keeps `nodes` in step with the item tree.
    pub sync: SyncEngine,
}

impl SceneGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            nodes: NodeGraph::new(),
            sync: SyncEngine::new(config),
        }
    }

    /// Reconciles the node graph with the scene's dirty items.
    pub fn synchronize(&mut self, scene: &mut Scene) -> SyncReport {
        self.sync.synchronize(&mut scene.items, &mut self.nodes)
    }

    /// Drops every node and marks the whole scene for rebuilding.
    pub fn invalidate(&mut self, scene: &mut Scene) {
        self.sync.invalidate(&mut self.nodes);
        scene.items.invalidate_scene_graph();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderable_needs_exposure_and_area() {
        let mut scene = Scene::new(WindowId(1));
        assert!(!scene.is_renderable());
        scene.set_exposed(true);
        assert!(!scene.is_renderable());
        scene.set_size(Size::new(800.0, 600.0));
        assert!(scene.is_renderable());
        assert_eq!(scene.items.size(scene.items.root()), Size::new(800.0, 600.0));
    }

    #[test]
    fn explicit_request_needs_frame_until_begin() {
        let mut scene = Scene::new(WindowId(1));
        let mut graph = SceneGraph::new(SyncConfig::default());
        let _ = graph.synchronize(&mut scene);
        assert!(!scene.needs_frame());
        scene.request_update();
        assert!(scene.needs_frame());
        scene.begin_frame();
        assert!(!scene.needs_frame());
    }

    #[test]
    fn destroying_the_focus_item_clears_focus() {
        let mut scene = Scene::new(WindowId(1));
        let root = scene.items.root();
        let parent = scene.items.create_item();
        scene.items.add_child(root, parent);
        let child = scene.items.create_item();
        scene.items.add_child(parent, child);

        scene.delivery.set_focus(&mut scene.items, parent);
        assert_eq!(scene.delivery.active_focus_item(), Some(parent));
        scene.destroy_item(parent);
        assert_eq!(scene.delivery.active_focus_item(), None);
        assert_eq!(scene.delivery.scope_focus_item(root), None);

        let other = scene.items.create_item();
        scene.items.add_child(root, other);
        scene.delivery.set_focus(&mut scene.items, other);
        assert_eq!(scene.delivery.active_focus_item(), Some(other));
    }
}
