// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Input delivery and the grab/hover/focus state it maintains.
//!
//! Delivery is synchronous and runs on the thread that owns the
//! [`ItemTree`]. The agent keeps:
//!
//! - at most one exclusive **grab** per input point, taken by the item that
//!   accepts the press and cleared when that point is released or cancelled;
//! - the **hover** chain under the mouse;
//! - the **active focus** item and, per focus scope, the item that last had
//!   focus inside it.
//!
//! Whenever one of these changes for an item with
//! [`HAS_CONTENTS`](ItemFlags::HAS_CONTENTS), the item is marked for a
//! paint-node update so pressed, hovered and focused looks reach the next
//! frame.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use bitflags::bitflags;
use kurbo::Point;

use crate::item::{EventResponse, ItemFlags, ItemId, ItemTree};

bitflags! {
    /// Keyboard modifiers held during an event.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// Shift.
        const SHIFT = 1 << 0;
        /// Control.
        const CONTROL = 1 << 1;
        /// Alt / Option.
        const ALT = 1 << 2;
        /// Meta / Command / Super.
        const META = 1 << 3;
    }
}

/// The device that produced a pointer event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerKind {
    /// Mouse or touchpad.
    Mouse,
    /// Touch screen contact.
    Touch,
    /// Stylus.
    Pen,
}

/// Lifecycle phase of one input point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerPhase {
    /// The point went down.
    Press,
    /// The point moved.
    Move,
    /// The point went up.
    Release,
    /// The platform took the point away.
    Cancel,
}

impl PointerPhase {
    /// Whether the point's sequence ends with this phase.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Release | Self::Cancel)
    }
}

/// A normalized pointer event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    /// Producing device.
    pub kind: PointerKind,
    /// Identifies the point across its press/move/release sequence.
    pub point_id: u32,
    /// Phase.
    pub phase: PointerPhase,
    /// Position in scene coordinates.
    pub position: Point,
    /// Held modifiers.
    pub modifiers: Modifiers,
}

/// Whether a key went down or up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyPhase {
    /// Key pressed (or auto-repeated).
    Press,
    /// Key released.
    Release,
}

/// A normalized key event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    /// Platform-independent key code.
    pub code: u32,
    /// Phase.
    pub phase: KeyPhase,
    /// Held modifiers.
    pub modifiers: Modifiers,
}

/// Routes input to items and owns grab, hover and focus state.
#[derive(Clone, Debug, Default)]
pub struct DeliveryAgent {
    grabs: BTreeMap<u32, ItemId>,
    hovered: Vec<ItemId>,
    active_focus: Option<ItemId>,
    scope_focus: BTreeMap<ItemId, ItemId>,
}

impl DeliveryAgent {
    /// Creates an agent with no grabs, hover or focus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The item holding the exclusive grab for `point_id`, if any.
    #[must_use]
    pub fn grabber(&self, point_id: u32) -> Option<ItemId> {
        self.grabs.get(&point_id).copied()
    }

    /// Items under the mouse that accept hover, innermost first.
    #[must_use]
    pub fn hovered_items(&self) -> &[ItemId] {
        &self.hovered
    }

    /// The item receiving key events.
    #[must_use]
    pub fn active_focus_item(&self) -> Option<ItemId> {
        self.active_focus
    }

    /// The item that last had focus inside `scope`.
    #[must_use]
    pub fn scope_focus_item(&self, scope: ItemId) -> Option<ItemId> {
        self.scope_focus.get(&scope).copied()
    }

    /// Delivers a pointer event. Returns the item that accepted it.
    ///
    /// An event for a grabbed point goes to the grabber only. Otherwise it
    /// goes to pointer-accepting items under the position, topmost first,
    /// until one accepts; an accepted press makes that item the grabber.
    /// The grab is released once the point reaches a terminal phase.
    pub fn deliver_pointer(&mut self, tree: &mut ItemTree, event: &PointerEvent) -> Option<ItemId> {
        let _ = tree.refresh_inherited();
        self.prune(tree);

        if event.kind == PointerKind::Mouse && event.phase == PointerPhase::Move {
            self.update_hover(tree, event.position);
        }

        if let Some(grabber) = self.grabber(event.point_id) {
            let response = Self::dispatch_pointer(tree, grabber, event);
            if event.phase.is_terminal() {
                self.grabs.remove(&event.point_id);
                Self::touch(tree, grabber);
            }
            return (response == EventResponse::Accepted).then_some(grabber);
        }

        if event.phase == PointerPhase::Cancel {
            return None;
        }

        for target in hit_test(tree, event.position, ItemFlags::ACCEPTS_POINTER) {
            // An earlier handler may have destroyed or detached it.
            if !tree.is_alive(target) || !tree.in_window(target) {
                continue;
            }
            if Self::dispatch_pointer(tree, target, event) == EventResponse::Accepted {
                if event.phase == PointerPhase::Press {
                    self.grabs.insert(event.point_id, target);
                    Self::touch(tree, target);
                }
                return Some(target);
            }
        }
        None
    }

    /// Delivers a key event to the active focus item, bubbling to ancestors
    /// until one accepts. Returns the accepting item.
    pub fn deliver_key(&mut self, tree: &mut ItemTree, event: &KeyEvent) -> Option<ItemId> {
        let _ = tree.refresh_inherited();
        self.prune(tree);
        let focus = self.active_focus?;
        let chain: Vec<ItemId> = tree.ancestors(focus).collect();
        for item in chain {
            if !tree.is_alive(item) || !tree.in_window(item) || !tree.effective_enabled(item) {
                continue;
            }
            let response = tree
                .with_delegate(item, |d, ctx| d.key_event(ctx, event))
                .unwrap_or(EventResponse::Ignored);
            if response == EventResponse::Accepted {
                return Some(item);
            }
        }
        None
    }

    /// Gives focus to `item`.
    ///
    /// The item becomes the focused item of its nearest enclosing focus
    /// scope. It receives active focus only if every enclosing scope is in
    /// turn the focused item of its own scope. When `item` is itself a scope
    /// holding a focused descendant, active focus goes to that descendant.
    pub fn set_focus(&mut self, tree: &mut ItemTree, item: ItemId) {
        self.prune(tree);
        if !tree.is_alive(item) || !tree.in_window(item) {
            return;
        }
        let scope = enclosing_scope(tree, item);
        self.scope_focus.insert(scope, item);

        let mut cur = item;
        let mut in_active_chain = true;
        while cur != tree.root() {
            let s = enclosing_scope(tree, cur);
            if self.scope_focus.get(&s) != Some(&cur) {
                in_active_chain = false;
                break;
            }
            cur = s;
        }
        if !in_active_chain {
            return;
        }

        let mut target = item;
        while tree.flags(target).contains(ItemFlags::IS_FOCUS_SCOPE) {
            match self.scope_focus.get(&target) {
                Some(&inner) if inner != target && tree.is_alive(inner) => target = inner,
                _ => break,
            }
        }
        self.change_active_focus(tree, Some(target));
    }

    /// Removes active focus.
    pub fn clear_focus(&mut self, tree: &mut ItemTree) {
        self.change_active_focus(tree, None);
    }

    /// Forgets every grab, hover entry and focus record referring to `item`.
    pub fn forget_item(&mut self, item: ItemId) {
        self.grabs.retain(|_, g| *g != item);
        self.hovered.retain(|h| *h != item);
        if self.active_focus == Some(item) {
            self.active_focus = None;
        }
        self.scope_focus.retain(|s, f| *s != item && *f != item);
    }

    /// Drops state that refers to destroyed items or items that left the
    /// window.
    pub fn prune(&mut self, tree: &ItemTree) {
        let gone = |id: &ItemId| !tree.is_alive(*id) || !tree.in_window(*id);
        self.grabs.retain(|_, g| !gone(g));
        self.hovered.retain(|h| !gone(h));
        if self.active_focus.as_ref().is_some_and(gone) {
            self.active_focus = None;
        }
        self.scope_focus.retain(|s, f| !gone(s) && !gone(f));
    }

    fn update_hover(&mut self, tree: &mut ItemTree, position: Point) {
        let now = hit_test(tree, position, ItemFlags::ACCEPTS_HOVER);
        let left: Vec<ItemId> = self
            .hovered
            .iter()
            .copied()
            .filter(|h| !now.contains(h))
            .collect();
        let entered: Vec<ItemId> = now
            .iter()
            .copied()
            .filter(|n| !self.hovered.contains(n))
            .collect();
        self.hovered = now;
        for item in left {
            tree.with_delegate(item, |d, ctx| d.hover_changed(ctx, false));
            Self::touch(tree, item);
        }
        for item in entered {
            tree.with_delegate(item, |d, ctx| d.hover_changed(ctx, true));
            Self::touch(tree, item);
        }
    }

    fn change_active_focus(&mut self, tree: &mut ItemTree, new: Option<ItemId>) {
        let old = self.active_focus;
        if old == new {
            return;
        }
        self.active_focus = new;
        if let Some(old) = old.filter(|o| tree.is_alive(*o)) {
            tree.with_delegate(old, |d, ctx| d.focus_changed(ctx, false));
            Self::touch(tree, old);
        }
        if let Some(new) = new {
            tree.with_delegate(new, |d, ctx| d.focus_changed(ctx, true));
            Self::touch(tree, new);
        }
    }

    fn dispatch_pointer(tree: &mut ItemTree, target: ItemId, event: &PointerEvent) -> EventResponse {
        if !tree.is_alive(target) {
            return EventResponse::Ignored;
        }
        let Some(local) = tree.map_from_scene(target, event.position) else {
            return EventResponse::Ignored;
        };
        tree.with_delegate(target, |d, ctx| d.pointer_event(ctx, event, local))
            .unwrap_or(EventResponse::Ignored)
    }

    /// Queues a paint-node update for items that draw.
    fn touch(tree: &mut ItemTree, item: ItemId) {
        if tree.is_alive(item) && tree.flags(item).contains(ItemFlags::HAS_CONTENTS) {
            tree.update(item);
        }
    }
}

/// Nearest strict ancestor that is a focus scope, or the root.
fn enclosing_scope(tree: &ItemTree, item: ItemId) -> ItemId {
    tree.ancestors(item)
        .skip(1)
        .find(|a| tree.flags(*a).contains(ItemFlags::IS_FOCUS_SCOPE))
        .unwrap_or_else(|| tree.root())
}

/// Items carrying `flag` whose bounds contain the scene `position`, topmost
/// first. Requires inherited state to be fresh.
///
/// Invisible and disabled subtrees are skipped, and a clipping item hides the
/// parts of its subtree outside its bounds.
#[must_use]
pub fn hit_test(tree: &ItemTree, position: Point, flag: ItemFlags) -> Vec<ItemId> {
    let mut out = Vec::new();
    hit_test_into(tree, tree.root(), position, flag, &mut out);
    out
}

fn hit_test_into(tree: &ItemTree, item: ItemId, position: Point, flag: ItemFlags, out: &mut Vec<ItemId>) {
    if !tree.effective_visible(item) || !tree.effective_enabled(item) {
        return;
    }
    let local = tree.map_from_scene(item, position);
    let inside = local.is_some_and(|p| tree.bounding_rect(item).contains(p));
    if tree.clip(item) && !inside {
        return;
    }
    for child in tree.paint_order_children(item).into_iter().rev() {
        hit_test_into(tree, child, position, flag, out);
    }
    if inside && tree.flags(item).contains(flag) {
        out.push(item);
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicUsize, Ordering};

    use kurbo::Size;

    use super::*;
    use crate::dirty::DirtyFlags;
    use crate::item::{ItemContext, ItemDelegate};

    struct Button {
        presses: Arc<AtomicUsize>,
        keys: bool,
    }

    impl ItemDelegate for Button {
        fn pointer_event(
            &mut self,
            _: &mut ItemContext<'_>,
            event: &PointerEvent,
            _: Point,
        ) -> EventResponse {
            if event.phase == PointerPhase::Press {
                self.presses.fetch_add(1, Ordering::Relaxed);
            }
            EventResponse::Accepted
        }

        fn key_event(&mut self, _: &mut ItemContext<'_>, _: &KeyEvent) -> EventResponse {
            if self.keys {
                EventResponse::Accepted
            } else {
                EventResponse::Ignored
            }
        }
    }

    fn button(tree: &mut ItemTree, parent: ItemId, at: Point, keys: bool) -> (ItemId, Arc<AtomicUsize>) {
        let presses = Arc::new(AtomicUsize::new(0));
        let id = tree.create_item_with(Box::new(Button {
            presses: presses.clone(),
            keys,
        }));
        tree.set_position(id, at);
        tree.set_size(id, Size::new(10.0, 10.0));
        tree.set_flags(id, ItemFlags::ACCEPTS_POINTER | ItemFlags::HAS_CONTENTS);
        tree.add_child(parent, id);
        (id, presses)
    }

    fn pointer(phase: PointerPhase, x: f64, y: f64) -> PointerEvent {
        PointerEvent {
            kind: PointerKind::Touch,
            point_id: 7,
            phase,
            position: Point::new(x, y),
            modifiers: Modifiers::empty(),
        }
    }

    #[test]
    fn press_grabs_and_release_clears() {
        let mut tree = ItemTree::new();
        let root = tree.root();
        tree.set_size(root, Size::new(100.0, 100.0));
        let (b, presses) = button(&mut tree, root, Point::new(5.0, 5.0), false);
        let mut agent = DeliveryAgent::new();

        assert_eq!(agent.deliver_pointer(&mut tree, &pointer(PointerPhase::Press, 8.0, 8.0)), Some(b));
        assert_eq!(agent.grabber(7), Some(b));
        assert_eq!(presses.load(Ordering::Relaxed), 1);

        // Moves outside the item still go to the grabber.
        assert_eq!(agent.deliver_pointer(&mut tree, &pointer(PointerPhase::Move, 90.0, 90.0)), Some(b));
        let _ = tree.drain_dirty();
        agent.deliver_pointer(&mut tree, &pointer(PointerPhase::Release, 90.0, 90.0));
        assert_eq!(agent.grabber(7), None);
        assert!(tree.dirty_flags(b).contains(DirtyFlags::CONTENT), "released look");
    }

    #[test]
    fn cancel_clears_grab() {
        let mut tree = ItemTree::new();
        let root = tree.root();
        let (b, _) = button(&mut tree, root, Point::ZERO, false);
        let mut agent = DeliveryAgent::new();
        agent.deliver_pointer(&mut tree, &pointer(PointerPhase::Press, 1.0, 1.0));
        assert_eq!(agent.grabber(7), Some(b));
        agent.deliver_pointer(&mut tree, &pointer(PointerPhase::Cancel, 1.0, 1.0));
        assert_eq!(agent.grabber(7), None);
    }

    #[test]
    fn topmost_item_wins() {
        let mut tree = ItemTree::new();
        let root = tree.root();
        let (low, low_presses) = button(&mut tree, root, Point::ZERO, false);
        let (high, _) = button(&mut tree, root, Point::ZERO, false);
        let mut agent = DeliveryAgent::new();
        assert_eq!(agent.deliver_pointer(&mut tree, &pointer(PointerPhase::Press, 1.0, 1.0)), Some(high));
        assert_eq!(low_presses.load(Ordering::Relaxed), 0);

        tree.set_z(low, 1.0);
        agent.deliver_pointer(&mut tree, &pointer(PointerPhase::Release, 1.0, 1.0));
        assert_eq!(agent.deliver_pointer(&mut tree, &pointer(PointerPhase::Press, 1.0, 1.0)), Some(low));
    }

    #[test]
    fn removed_grabber_is_forgotten() {
        let mut tree = ItemTree::new();
        let root = tree.root();
        let (b, _) = button(&mut tree, root, Point::ZERO, false);
        let mut agent = DeliveryAgent::new();
        agent.deliver_pointer(&mut tree, &pointer(PointerPhase::Press, 1.0, 1.0));
        tree.destroy_item(b);
        agent.prune(&tree);
        assert_eq!(agent.grabber(7), None);
    }

    /// Destroys `victim` when hit and lets the event through.
    struct Demolisher {
        victim: ItemId,
    }

    impl ItemDelegate for Demolisher {
        fn pointer_event(
            &mut self,
            ctx: &mut ItemContext<'_>,
            _: &PointerEvent,
            _: Point,
        ) -> EventResponse {
            ctx.tree().destroy_item(self.victim);
            EventResponse::Ignored
        }
    }

    #[test]
    fn items_destroyed_by_an_earlier_handler_are_skipped() {
        let mut tree = ItemTree::new();
        let root = tree.root();
        let (low, low_presses) = button(&mut tree, root, Point::ZERO, false);
        let high = tree.create_item_with(Box::new(Demolisher { victim: low }));
        tree.set_size(high, Size::new(10.0, 10.0));
        tree.set_flags(high, ItemFlags::ACCEPTS_POINTER);
        tree.add_child(root, high);
        let mut agent = DeliveryAgent::new();

        assert_eq!(agent.deliver_pointer(&mut tree, &pointer(PointerPhase::Press, 1.0, 1.0)), None);
        assert!(!tree.is_alive(low));
        assert_eq!(low_presses.load(Ordering::Relaxed), 0);
        assert_eq!(agent.grabber(7), None);
    }

    #[test]
    fn forgetting_an_item_drops_its_grab_hover_and_focus() {
        let mut tree = ItemTree::new();
        let root = tree.root();
        let (b, _) = button(&mut tree, root, Point::ZERO, false);
        tree.set_flags(b, ItemFlags::ACCEPTS_POINTER | ItemFlags::ACCEPTS_HOVER);
        let mut agent = DeliveryAgent::new();
        agent.deliver_pointer(&mut tree, &pointer(PointerPhase::Press, 1.0, 1.0));
        let mut hover = pointer(PointerPhase::Move, 2.0, 2.0);
        hover.kind = PointerKind::Mouse;
        hover.point_id = 1;
        agent.deliver_pointer(&mut tree, &hover);
        agent.set_focus(&mut tree, b);
        assert_eq!(agent.grabber(7), Some(b));
        assert_eq!(agent.hovered_items(), &[b]);
        assert_eq!(agent.active_focus_item(), Some(b));

        agent.forget_item(b);
        assert_eq!(agent.grabber(7), None);
        assert!(agent.hovered_items().is_empty());
        assert_eq!(agent.active_focus_item(), None);
        assert_eq!(agent.scope_focus_item(root), None);
        assert!(tree.is_alive(b), "only delivery state is touched");
    }

    #[test]
    fn keys_bubble_to_accepting_ancestor() {
        let mut tree = ItemTree::new();
        let root = tree.root();
        let (outer, _) = button(&mut tree, root, Point::ZERO, true);
        let (inner, _) = button(&mut tree, outer, Point::ZERO, false);
        let mut agent = DeliveryAgent::new();
        agent.set_focus(&mut tree, inner);
        assert_eq!(agent.active_focus_item(), Some(inner));
        let key = KeyEvent {
            code: 13,
            phase: KeyPhase::Press,
            modifiers: Modifiers::empty(),
        };
        assert_eq!(agent.deliver_key(&mut tree, &key), Some(outer));
    }

    #[test]
    fn focus_scope_remembers_child() {
        let mut tree = ItemTree::new();
        let root = tree.root();
        let scope = tree.create_item();
        tree.set_flags(scope, ItemFlags::IS_FOCUS_SCOPE);
        tree.add_child(root, scope);
        let other = tree.create_item();
        tree.add_child(root, other);
        let inner = tree.create_item();
        tree.add_child(scope, inner);

        let mut agent = DeliveryAgent::new();
        agent.set_focus(&mut tree, other);
        agent.set_focus(&mut tree, inner);
        // The scope itself is not focused, so `inner` only becomes the scope's
        // focus item.
        assert_eq!(agent.active_focus_item(), Some(other));
        assert_eq!(agent.scope_focus_item(scope), Some(inner));

        agent.set_focus(&mut tree, scope);
        assert_eq!(agent.active_focus_item(), Some(inner));
    }

    #[test]
    fn hover_tracks_enter_and_leave() {
        let mut tree = ItemTree::new();
        let root = tree.root();
        let a = tree.create_item();
        tree.set_size(a, Size::new(10.0, 10.0));
        tree.set_flags(a, ItemFlags::ACCEPTS_HOVER);
        tree.add_child(root, a);
        let mut agent = DeliveryAgent::new();
        let mut ev = pointer(PointerPhase::Move, 5.0, 5.0);
        ev.kind = PointerKind::Mouse;
        agent.deliver_pointer(&mut tree, &ev);
        assert_eq!(agent.hovered_items(), &[a]);
        ev.position = Point::new(50.0, 50.0);
        agent.deliver_pointer(&mut tree, &ev);
        assert!(agent.hovered_items().is_empty());
    }
}
