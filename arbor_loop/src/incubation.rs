// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Time-sliced background work on the GUI thread.
//!
//! Building a large subtree at once stalls frames. An [`Incubator`] splits
//! the work into steps, and the [`IncubationController`] runs steps in the
//! gap a render loop leaves after each frame: while the threaded loop's
//! render thread draws, or after the basic loop presented.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use arbor_core::scene::Scene;

use crate::config::RenderLoopConfig;

/// Progress of an [`Incubator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncubationStatus {
    /// More steps are needed.
    Loading,
    /// Done; the incubator is dropped.
    Ready,
}

/// Work that can be advanced one bounded step at a time.
pub trait Incubator: Send {
    /// Performs one step, typically creating a few items.
    fn step(&mut self, scene: &mut Scene) -> IncubationStatus;
}

/// Queue of incubators advanced round-robin between frames.
pub struct IncubationController {
    queue: VecDeque<Box<dyn Incubator>>,
    incubation_time: Duration,
}

impl Default for IncubationController {
    fn default() -> Self {
        Self::with_incubation_time(RenderLoopConfig::default().incubation_time())
    }
}

impl core::fmt::Debug for IncubationController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IncubationController")
            .field("incubating", &self.queue.len())
            .field("incubation_time", &self.incubation_time)
            .finish()
    }
}

impl IncubationController {
    /// Creates an empty controller with the default per-frame budget.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty controller that spends `incubation_time` after
    /// each frame.
    #[must_use]
    pub fn with_incubation_time(incubation_time: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            incubation_time,
        }
    }

    /// Time spent incubating after each frame.
    #[must_use]
    pub fn incubation_time(&self) -> Duration {
        self.incubation_time
    }

    /// Queues an incubator.
    pub fn incubate(&mut self, incubator: Box<dyn Incubator>) {
        self.queue.push_back(incubator);
    }

    /// Number of incubators not yet ready.
    #[must_use]
    pub fn incubating_count(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Runs steps until `budget` is spent or every incubator is ready.
    /// At least one step runs when anything is queued. Returns the number of
    /// incubators that completed.
    pub fn incubate_for(&mut self, scene: &mut Scene, budget: Duration) -> usize {
        let deadline = Instant::now() + budget;
        let mut completed = 0;
        while let Some(mut incubator) = self.queue.pop_front() {
            match incubator.step(scene) {
                IncubationStatus::Ready => completed += 1,
                IncubationStatus::Loading => self.queue.push_back(incubator),
            }
            if Instant::now() >= deadline {
                break;
            }
        }
        if completed > 0 {
            log::trace!(
                "incubation: {completed} ready, {} pending",
                self.queue.len()
            );
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use arbor_core::window::WindowId;

    use super::*;

    /// Adds `remaining` children to the content root, one per step.
    struct Spawner {
        remaining: usize,
    }

    impl Incubator for Spawner {
        fn step(&mut self, scene: &mut Scene) -> IncubationStatus {
            let root = scene.items.root();
            let item = scene.items.create_item();
            scene.items.add_child(root, item);
            self.remaining -= 1;
            if self.remaining == 0 {
                IncubationStatus::Ready
            } else {
                IncubationStatus::Loading
            }
        }
    }

    #[test]
    fn runs_to_completion_with_a_generous_budget() {
        let mut scene = Scene::new(WindowId(0));
        let mut controller = IncubationController::new();
        controller.incubate(Box::new(Spawner { remaining: 3 }));
        controller.incubate(Box::new(Spawner { remaining: 1 }));
        assert_eq!(controller.incubating_count(), 2);

        let done = controller.incubate_for(&mut scene, Duration::from_secs(10));
        assert_eq!(done, 2);
        assert!(controller.is_idle());
        let root = scene.items.root();
        assert_eq!(scene.items.children(root).count(), 4);
    }

    #[test]
    fn default_budget_follows_the_frame_interval() {
        let controller = IncubationController::new();
        assert_eq!(
            controller.incubation_time(),
            RenderLoopConfig::default().incubation_time()
        );
        let slow = IncubationController::with_incubation_time(Duration::from_millis(8));
        assert_eq!(slow.incubation_time(), Duration::from_millis(8));
    }

    #[test]
    fn zero_budget_still_makes_progress() {
        let mut scene = Scene::new(WindowId(0));
        let mut controller = IncubationController::new();
        controller.incubate(Box::new(Spawner { remaining: 2 }));
        assert_eq!(controller.incubate_for(&mut scene, Duration::ZERO), 0);
        assert_eq!(controller.incubating_count(), 1);
        assert_eq!(controller.incubate_for(&mut scene, Duration::ZERO), 1);
        assert!(controller.is_idle());
    }
}
