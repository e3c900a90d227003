// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-shot callbacks run on the rendering thread at fixed frame stages.

use arbor_core::node::NodeGraph;

/// Points in a frame at which scheduled render jobs run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderStage {
    /// After polish, before the sync pass.
    BeforeSynchronizing,
    /// Right after the sync pass, still inside the GUI barrier.
    AfterSynchronizing,
    /// Before the render plan is built.
    BeforeRendering,
    /// After the plan was handed to the backend, before presenting.
    AfterRendering,
    /// After the frame was presented.
    AfterSwap,
}

impl RenderStage {
    const ALL: [Self; 5] = [
        Self::BeforeSynchronizing,
        Self::AfterSynchronizing,
        Self::BeforeRendering,
        Self::AfterRendering,
        Self::AfterSwap,
    ];

    const fn index(self) -> usize {
        match self {
            Self::BeforeSynchronizing => 0,
            Self::AfterSynchronizing => 1,
            Self::BeforeRendering => 2,
            Self::AfterRendering => 3,
            Self::AfterSwap => 4,
        }
    }
}

/// A callback run once on the rendering thread with the window's node graph.
pub type RenderJob = Box<dyn FnOnce(&mut NodeGraph) + Send>;

/// Jobs waiting for their stage, in scheduling order per stage.
#[derive(Default)]
pub(crate) struct RenderJobQueue {
    stages: [Vec<RenderJob>; 5],
}

impl core::fmt::Debug for RenderJobQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let counts: Vec<usize> = self.stages.iter().map(Vec::len).collect();
        f.debug_struct("RenderJobQueue")
            .field("pending", &counts)
            .finish()
    }
}

impl RenderJobQueue {
    pub(crate) fn schedule(&mut self, stage: RenderStage, job: RenderJob) {
        self.stages[stage.index()].push(job);
    }

    /// Removes the jobs of one stage so they can run without holding the
    /// queue.
    pub(crate) fn take(&mut self, stage: RenderStage) -> Vec<RenderJob> {
        core::mem::take(&mut self.stages[stage.index()])
    }

    /// Removes every pending job, earlier stages first.
    pub(crate) fn take_all(&mut self) -> Vec<RenderJob> {
        RenderStage::ALL
            .into_iter()
            .flat_map(|stage| self.take(stage))
            .collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.stages.iter().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn take_all_drains_in_stage_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut queue = RenderJobQueue::default();
        for stage in [RenderStage::AfterSwap, RenderStage::BeforeSynchronizing] {
            let order = Arc::clone(&order);
            queue.schedule(stage, Box::new(move |_| order.lock().push(stage)));
        }
        let mut graph = NodeGraph::new();
        for job in queue.take_all() {
            job(&mut graph);
        }
        assert!(queue.is_empty());
        assert_eq!(
            *order.lock(),
            [RenderStage::BeforeSynchronizing, RenderStage::AfterSwap]
        );
    }

    #[test]
    fn jobs_run_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut queue = RenderJobQueue::default();
        let c = Arc::clone(&count);
        queue.schedule(
            RenderStage::BeforeRendering,
            Box::new(move |_| {
                c.fetch_add(1, Ordering::Relaxed);
            }),
        );
        let mut graph = NodeGraph::new();
        for _ in 0..2 {
            for job in queue.take(RenderStage::BeforeRendering) {
                job(&mut graph);
            }
        }
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}
