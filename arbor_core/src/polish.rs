// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Polish queue and loop detection.
//!
//! Polish is the pre-sync pass in which items settle layout-dependent state.
//! The queue is a stack: [`ItemTree::polish`] pushes and
//! [`ItemTree::polish_items`] pops. So when an item's `update_polish`
//! schedules polish on some item, that item is the very next one processed,
//! and the queue is longer after the call than it was before. A run of such
//! growth steps without a single well-behaved `update_polish` in between is
//! the signature of a polish loop.

use crate::item::{ItemId, ItemTree};

/// Default number of consecutive re-scheduling polish calls after which the
/// polish pass is abandoned for the frame.
pub const DEFAULT_POLISH_LOOP_LIMIT: usize = 1000;

/// Outcome of one [`ItemTree::polish_items`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PolishReport {
    /// Number of `update_polish` calls made.
    pub polished: usize,
    /// Whether the pass was cut short by the loop detector.
    pub aborted: bool,
    /// On abort, the item whose `update_polish` last re-scheduled polish.
    pub culprit: Option<ItemId>,
    /// On abort, the item it scheduled.
    pub guilty: Option<ItemId>,
}

/// Counts consecutive polish calls that grew the queue.
#[derive(Clone, Copy, Debug)]
pub struct PolishLoopDetector {
    limit: usize,
    in_sequence: usize,
}

impl PolishLoopDetector {
    /// Creates a detector that trips after `limit` consecutive growth steps.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            limit,
            in_sequence: 0,
        }
    }

    /// Records one polish call. Returns `true` when the pass should stop.
    pub fn check(&mut self, remaining_before: usize, remaining_after: usize) -> bool {
        if remaining_after > remaining_before {
            self.in_sequence += 1;
            self.in_sequence >= self.limit
        } else {
            self.in_sequence = 0;
            false
        }
    }

    /// Current run length.
    #[must_use]
    pub const fn in_sequence(&self) -> usize {
        self.in_sequence
    }
}

impl ItemTree {
    /// Schedules `update_polish` for the item before the next sync.
    ///
    /// Scheduling twice before the pass runs has no further effect. Items
    /// outside the window are remembered and queued when they join it.
    pub fn polish(&mut self, id: ItemId) {
        self.validate(id);
        let i = id.idx as usize;
        if self.polish_scheduled[i] {
            return;
        }
        self.polish_scheduled[i] = true;
        if self.in_window(id) {
            self.polish_queue.push(id.idx);
        }
    }

    /// Whether any item waits for polish.
    #[must_use]
    pub fn has_pending_polish(&self) -> bool {
        !self.polish_queue.is_empty()
    }

    /// Runs `update_polish` on queued items until the queue is empty or the
    /// loop detector trips after `loop_limit` consecutive re-scheduling calls.
    ///
    /// On abort the remaining items stay queued for the next frame.
    pub fn polish_items(&mut self, loop_limit: usize) -> PolishReport {
        let mut report = PolishReport::default();
        let mut detector = PolishLoopDetector::new(loop_limit.max(1));
        while let Some(idx) = self.polish_queue.pop() {
            self.polish_scheduled[idx as usize] = false;
            let item = self.handle(idx);
            let remaining = self.polish_queue.len();
            self.with_delegate(item, |d, ctx| d.update_polish(ctx));
            report.polished += 1;
            if detector.check(remaining, self.polish_queue.len()) {
                let guilty = self.polish_queue.last().map(|&g| self.handle(g));
                log::warn!(
                    "possible polish loop: {guilty:?} was scheduled from update_polish of {item:?} \
                     {} times in a row; abandoning polish for this frame",
                    detector.in_sequence()
                );
                report.aborted = true;
                report.culprit = Some(item);
                report.guilty = guilty;
                break;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;

    use super::*;
    use crate::item::{ItemContext, ItemDelegate};

    struct Counter(usize);

    impl ItemDelegate for Counter {
        fn update_polish(&mut self, _: &mut ItemContext<'_>) {
            self.0 += 1;
        }
    }

    struct Relentless;

    impl ItemDelegate for Relentless {
        fn update_polish(&mut self, ctx: &mut ItemContext<'_>) {
            ctx.polish();
        }
    }

    #[test]
    fn detector_resets_on_progress() {
        let mut d = PolishLoopDetector::new(3);
        assert!(!d.check(0, 1));
        assert!(!d.check(1, 2));
        assert!(!d.check(2, 1));
        assert_eq!(d.in_sequence(), 0);
        assert!(!d.check(1, 2));
        assert!(!d.check(2, 3));
        assert!(d.check(3, 4));
    }

    #[test]
    fn polish_runs_each_scheduled_item_once() {
        let mut tree = ItemTree::new();
        let root = tree.root();
        let a = tree.create_item_with(Box::new(Counter(0)));
        tree.add_child(root, a);
        tree.polish(a);
        tree.polish(a);
        let report = tree.polish_items(DEFAULT_POLISH_LOOP_LIMIT);
        assert_eq!(report.polished, 1);
        assert!(!report.aborted);
        assert!(!tree.has_pending_polish());
    }

    #[test]
    fn detached_polish_waits_for_window() {
        let mut tree = ItemTree::new();
        let a = tree.create_item();
        tree.polish(a);
        assert!(!tree.has_pending_polish());
        let root = tree.root();
        tree.add_child(root, a);
        assert!(tree.has_pending_polish());
    }

    #[test]
    fn self_scheduling_polish_is_capped() {
        let mut tree = ItemTree::new();
        let root = tree.root();
        let a = tree.create_item_with(Box::new(Relentless));
        tree.add_child(root, a);
        tree.polish(a);
        let report = tree.polish_items(1000);
        assert!(report.aborted);
        assert_eq!(report.polished, 1000);
        assert_eq!(report.culprit, Some(a));
        assert_eq!(report.guilty, Some(a));
        assert!(tree.has_pending_polish(), "loop continues next frame");
    }
}
