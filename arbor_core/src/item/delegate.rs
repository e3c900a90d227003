// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The behavior hooks an item exposes to the core.
//!
//! Item variants are not modeled as subtypes. An item is plain data in the
//! [`ItemTree`] plus an optional boxed [`ItemDelegate`] supplying the handful
//! of callbacks the core needs. Role-like distinctions (focus scope,
//! viewport, has-contents) are [`ItemFlags`](super::ItemFlags) bits.
//!
//! While a callback runs, the delegate is temporarily taken out of the tree,
//! so the callback may freely mutate the tree through its context, including
//! the item it belongs to.

use kurbo::{Rect, Size};

use super::id::ItemId;
use super::store::ItemTree;
use crate::delivery::{KeyEvent, PointerEvent};
use crate::node::{NodeGraph, NodeId, PaintError};

/// Whether an event handler consumed an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventResponse {
    /// The event was consumed; propagation stops.
    Accepted,
    /// The event was not handled; delivery moves on to the next candidate.
    Ignored,
}

/// Per-item callbacks invoked by the core.
///
/// Every method has a default that does nothing, so delegates implement only
/// the hooks they care about.
pub trait ItemDelegate: Send {
    /// Produces or updates this item's paint node.
    ///
    /// Called during sync when the item has
    /// [`HAS_CONTENTS`](super::ItemFlags::HAS_CONTENTS) and any flag in
    /// [`CONTENT_UPDATE_MASK`](crate::dirty::DirtyFlags::CONTENT_UPDATE_MASK)
    /// is pending. `previous` is the node returned last time, if any.
    ///
    /// Returning a node other than `previous` hands `previous` back to the
    /// engine, which destroys it. On error the engine keeps `previous`.
    fn update_paint_node(
        &mut self,
        previous: Option<NodeId>,
        ctx: &mut PaintNodeContext<'_>,
    ) -> Result<Option<NodeId>, PaintError> {
        let _ = ctx;
        Ok(previous)
    }

    /// Settles layout-dependent state before sync.
    fn update_polish(&mut self, ctx: &mut ItemContext<'_>) {
        let _ = ctx;
    }

    /// Called after the item's geometry changed.
    fn geometry_changed(&mut self, ctx: &mut ItemContext<'_>, old: Rect, new: Rect) {
        let _ = (ctx, old, new);
    }

    /// Handles a pointer event. `local` is the event position in item
    /// coordinates.
    fn pointer_event(
        &mut self,
        ctx: &mut ItemContext<'_>,
        event: &PointerEvent,
        local: kurbo::Point,
    ) -> EventResponse {
        let _ = (ctx, event, local);
        EventResponse::Ignored
    }

    /// Handles a key event delivered to the focus chain.
    fn key_event(&mut self, ctx: &mut ItemContext<'_>, event: &KeyEvent) -> EventResponse {
        let _ = (ctx, event);
        EventResponse::Ignored
    }

    /// Called when the pointer enters or leaves the item.
    fn hover_changed(&mut self, ctx: &mut ItemContext<'_>, hovered: bool) {
        let _ = (ctx, hovered);
    }

    /// Called when the item gains or loses active focus.
    fn focus_changed(&mut self, ctx: &mut ItemContext<'_>, focused: bool) {
        let _ = (ctx, focused);
    }
}

/// Mutable access to the tree from inside a delegate callback.
pub struct ItemContext<'a> {
    pub(crate) tree: &'a mut ItemTree,
    pub(crate) item: ItemId,
}

impl core::fmt::Debug for ItemContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ItemContext")
            .field("item", &self.item)
            .finish_non_exhaustive()
    }
}

impl ItemContext<'_> {
    /// The item whose delegate is running.
    #[must_use]
    pub fn item(&self) -> ItemId {
        self.item
    }

    /// The whole item tree.
    pub fn tree(&mut self) -> &mut ItemTree {
        self.tree
    }

    /// Requests a new paint node for this item on the next sync.
    pub fn update(&mut self) {
        self.tree.update(self.item);
    }

    /// Schedules another polish pass for this item.
    pub fn polish(&mut self) {
        self.tree.polish(self.item);
    }
}

/// What a delegate sees while producing its paint node.
///
/// The item tree is read-only here: sync has already snapshotted the dirty
/// state, so the only way to ask for more work is
/// [`request_update`](Self::request_update), which takes effect on the next
/// frame.
pub struct PaintNodeContext<'a> {
    pub(crate) item: ItemId,
    pub(crate) tree: &'a ItemTree,
    pub(crate) graph: &'a mut NodeGraph,
    pub(crate) update_requested: bool,
}

impl core::fmt::Debug for PaintNodeContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PaintNodeContext")
            .field("item", &self.item)
            .field("update_requested", &self.update_requested)
            .finish_non_exhaustive()
    }
}

impl PaintNodeContext<'_> {
    /// The item being painted.
    #[must_use]
    pub fn item(&self) -> ItemId {
        self.item
    }

    /// Read-only view of the item tree.
    #[must_use]
    pub fn tree(&self) -> &ItemTree {
        self.tree
    }

    /// The node graph, for creating or updating the paint node.
    pub fn graph(&mut self) -> &mut NodeGraph {
        self.graph
    }

    /// Current size of the item.
    #[must_use]
    pub fn size(&self) -> Size {
        self.tree.size(self.item)
    }

    /// Current bounds of the item in its own coordinates.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.tree.bounding_rect(self.item)
    }

    /// Asks for another paint-node update on the next frame.
    pub fn request_update(&mut self) {
        self.update_requested = true;
    }
}
