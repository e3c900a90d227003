// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The frame procedure both loops share.
//!
//! A frame is split at the sync barrier:
//!
//! ```text
//!   GUI state locked                      GUI state free
//!   ─────────────────────────────────┐   ┌──────────────────────────────
//!   polish ─► BeforeSynchronizing    │   │ BeforeRendering ─► build plan
//!        ─► sync ─► AfterSynchronizing│ ─►│ ─► render ─► AfterRendering
//!                                    │   │ ─► present ─► AfterSwap
//!   ─────────────────────────────────┘   └──────────────────────────────
//!            Renderer::sync                     Renderer::render
//! ```
//!
//! [`Renderer::render`] reads only the node graph and values captured
//! during [`Renderer::sync`], so the GUI thread may resume as soon as sync
//! returns.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use arbor_core::polish::PolishReport;
use arbor_core::scene::{Scene, SceneGraph};
use arbor_core::sync::SyncStats;
#[cfg(feature = "trace-rich")]
use arbor_core::trace::ItemChange;
use arbor_core::trace::{
    FrameBeginEvent, FrameSkippedEvent, FrameSummaryBuilder, PhaseBeginEvent, PhaseEndEvent,
    PhaseKind, PolishEvent, PresentEvent, SkipReason, SyncEvent, TraceSink, Tracer,
};
use arbor_core::window::WindowId;
use arbor_render::{DamageRegion, RenderPlan};
use kurbo::Size;
use parking_lot::Mutex;

use crate::backend::GraphicsBackend;
use crate::config::RenderLoopConfig;
use crate::error::{BackendError, RenderError, panic_message};
use crate::jobs::{RenderJobQueue, RenderStage};

/// What a synced frame did before rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    /// Monotonic per-window frame counter.
    pub frame_index: u64,
    /// The polish pass.
    pub polish: PolishReport,
    /// The sync pass.
    pub sync: SyncStats,
    /// Items whose sync failed; their previous nodes were kept.
    pub sync_errors: usize,
}

/// Result of asking a loop for a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Nothing was dirty and no update was requested.
    Idle,
    /// The frame ended early. Sync-complete was still signalled.
    Skipped(SkipReason),
    /// Polish and sync ran. Rendering continues on the render thread.
    Synced(FrameInfo),
    /// Polish, sync, render and present all ran.
    Presented(FrameInfo),
}

/// Flags both threads read and write without holding the scene lock.
#[derive(Debug)]
pub(crate) struct Shared {
    exposed: AtomicBool,
    invalidate_scene: AtomicBool,
    frame_requested: AtomicBool,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            exposed: AtomicBool::new(false),
            invalidate_scene: AtomicBool::new(false),
            frame_requested: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_exposed(&self, exposed: bool) {
        self.exposed.store(exposed, Ordering::Release);
    }

    /// Whether the render side asked for a frame on its own, after losing
    /// its resources.
    pub(crate) fn frame_requested(&self) -> bool {
        self.frame_requested.load(Ordering::Acquire)
    }

    fn request_rebuild(&self) {
        self.invalidate_scene.store(true, Ordering::Release);
        self.frame_requested.store(true, Ordering::Release);
    }
}

/// Shows or hides the window on both sides of the barrier. Showing
/// requests a frame.
pub(crate) fn expose(scene: &Mutex<Scene>, shared: &Shared, exposed: bool) {
    let mut scene = scene.lock();
    scene.set_exposed(exposed);
    if exposed {
        scene.request_update();
    }
    shared.set_exposed(exposed);
}

/// Runs `f`, turning a panic into [`RenderError::Panicked`].
pub(crate) fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, RenderError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(&*payload);
        log::error!("render cycle panicked: {message}");
        RenderError::Panicked(message)
    })
}

fn tracer(sink: &mut Option<Box<dyn TraceSink + Send>>) -> Tracer<'_> {
    match sink {
        Some(sink) => Tracer::new(&mut **sink),
        None => Tracer::none(),
    }
}

/// Everything the rendering thread owns for one window.
pub(crate) struct Renderer {
    window: WindowId,
    graph: SceneGraph,
    backend: Box<dyn GraphicsBackend>,
    backend_ready: bool,
    sink: Option<Box<dyn TraceSink + Send>>,
    jobs: Arc<Mutex<RenderJobQueue>>,
    shared: Arc<Shared>,
    polish_loop_limit: usize,
    epoch: Instant,
    frame_index: u64,
    summary: Option<FrameSummaryBuilder>,
    size: Size,
    last_plan: RenderPlan,
    shut_down: bool,
}

impl core::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Renderer")
            .field("window", &self.window)
            .field("backend_ready", &self.backend_ready)
            .field("frame_index", &self.frame_index)
            .finish_non_exhaustive()
    }
}

impl Renderer {
    pub(crate) fn new(
        window: WindowId,
        config: &RenderLoopConfig,
        backend: Box<dyn GraphicsBackend>,
        sink: Option<Box<dyn TraceSink + Send>>,
        jobs: Arc<Mutex<RenderJobQueue>>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            window,
            graph: SceneGraph::new(config.sync),
            backend,
            backend_ready: false,
            sink,
            jobs,
            shared,
            polish_loop_limit: config.polish_loop_limit,
            epoch: Instant::now(),
            frame_index: 0,
            summary: None,
            size: Size::ZERO,
            last_plan: RenderPlan::new(window),
            shut_down: false,
        }
    }

    fn now_ns(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn mark(&mut self, phase: PhaseKind, begin: bool) {
        let timestamp_ns = self.now_ns();
        let frame_index = self.frame_index;
        let mut tracer = tracer(&mut self.sink);
        if begin {
            if let Some(summary) = &mut self.summary {
                summary.phase_begin(phase, timestamp_ns);
            }
            tracer.phase_begin(&PhaseBeginEvent {
                frame_index,
                phase,
                timestamp_ns,
            });
        } else {
            if let Some(summary) = &mut self.summary {
                summary.phase_end(phase, timestamp_ns);
            }
            tracer.phase_end(&PhaseEndEvent {
                frame_index,
                phase,
                timestamp_ns,
            });
        }
    }

    fn run_jobs(&mut self, stage: RenderStage) {
        // Taken first so jobs may schedule further jobs.
        let jobs = self.jobs.lock().take(stage);
        for job in jobs {
            job(&mut self.graph.nodes);
        }
    }

    fn ensure_backend(&mut self) -> Result<(), BackendError> {
        if !self.backend_ready {
            self.backend.initialize()?;
            self.backend_ready = true;
            log::debug!("backend initialized for {:?}", self.window);
        }
        Ok(())
    }

    /// Applies a rebuild requested after resources were dropped.
    fn prepare(&mut self, scene: &mut Scene) {
        if self.shared.invalidate_scene.swap(false, Ordering::AcqRel) {
            log::debug!("rebuilding the scene graph of {:?}", self.window);
            self.graph.invalidate(scene);
        }
    }

    /// Polish and sync. The caller holds the GUI state for the duration.
    pub(crate) fn sync(&mut self, scene: &mut Scene) -> FrameOutcome {
        self.prepare(scene);
        let requested = self.shared.frame_requested.swap(false, Ordering::AcqRel);
        if !requested && !scene.needs_frame() {
            log::trace!("{:?}: no changes, frame skipped", self.window);
            return FrameOutcome::Idle;
        }
        if !scene.is_renderable() {
            if requested {
                self.shared.frame_requested.store(true, Ordering::Release);
            }
            log::trace!("{:?}: not renderable", self.window);
            return FrameOutcome::Skipped(SkipReason::NotRenderable);
        }
        if let Err(e) = self.ensure_backend() {
            log::error!("{:?}: {e}", self.window);
            return FrameOutcome::Skipped(SkipReason::Failed);
        }

        self.frame_index += 1;
        let frame_index = self.frame_index;
        let begin = FrameBeginEvent {
            frame_index,
            window: self.window,
            timestamp_ns: self.now_ns(),
        };
        self.summary = Some(FrameSummaryBuilder::new(&begin));
        tracer(&mut self.sink).frame_begin(&begin);
        scene.begin_frame();

        self.mark(PhaseKind::Polish, true);
        let polish = scene.polish(self.polish_loop_limit);
        self.mark(PhaseKind::Polish, false);
        tracer(&mut self.sink).polish(&PolishEvent {
            frame_index,
            report: polish,
        });

        self.run_jobs(RenderStage::BeforeSynchronizing);
        self.mark(PhaseKind::Sync, true);
        let report = self.graph.synchronize(scene);
        self.mark(PhaseKind::Sync, false);
        self.run_jobs(RenderStage::AfterSynchronizing);

        let mut tracer = tracer(&mut self.sink);
        tracer.sync(&SyncEvent {
            frame_index,
            stats: report.stats,
        });
        #[cfg(feature = "trace-rich")]
        {
            let changes: Vec<ItemChange> = report
                .drained
                .iter()
                .map(|e| ItemChange {
                    item_index: e.item.index(),
                    flags: e.flags,
                })
                .collect();
            tracer.item_changes(frame_index, &changes);
        }

        self.size = scene.size();
        FrameOutcome::Synced(FrameInfo {
            frame_index,
            polish,
            sync: report.stats,
            sync_errors: report.errors.len(),
        })
    }

    /// Renders and presents the frame synced last. Returns why the frame
    /// was not presented, if it was not.
    pub(crate) fn render(&mut self) -> Option<SkipReason> {
        let skipped = if !self.shared.exposed.load(Ordering::Acquire) {
            Some(SkipReason::NotRenderable)
        } else {
            match self.draw() {
                Ok(()) => None,
                Err(BackendError::DeviceLost) => {
                    self.lose_device();
                    Some(SkipReason::DeviceLost)
                }
                Err(e) => {
                    log::error!("{:?}: frame {} failed: {e}", self.window, self.frame_index);
                    Some(SkipReason::Failed)
                }
            }
        };
        self.finish(skipped);
        skipped
    }

    fn draw(&mut self) -> Result<(), BackendError> {
        self.run_jobs(RenderStage::BeforeRendering);
        self.mark(PhaseKind::Render, true);
        let plan = RenderPlan::build(&self.graph.nodes, self.window);
        let changes = self.graph.nodes.take_dirty();
        let damage = DamageRegion::from_changes(&changes, &self.last_plan, &plan);
        self.backend.begin_frame(self.size)?;
        self.backend.render(&plan, &damage)?;
        self.last_plan = plan;
        self.mark(PhaseKind::Render, false);
        self.run_jobs(RenderStage::AfterRendering);

        self.mark(PhaseKind::Present, true);
        self.backend.present()?;
        self.mark(PhaseKind::Present, false);
        let presented_at_ns = self.now_ns();
        tracer(&mut self.sink).present(&PresentEvent {
            frame_index: self.frame_index,
            presented_at_ns,
        });
        self.run_jobs(RenderStage::AfterSwap);
        Ok(())
    }

    fn finish(&mut self, skipped: Option<SkipReason>) {
        let frame_index = self.frame_index;
        let mut tracer = tracer(&mut self.sink);
        if let Some(reason) = skipped {
            tracer.frame_skipped(&FrameSkippedEvent {
                frame_index,
                reason,
            });
        }
        if let Some(mut summary) = self.summary.take() {
            summary.set_skipped(skipped.is_some());
            tracer.frame_summary(&summary.finish());
        }
    }

    /// Drops the node graph and device resources after a device loss and
    /// brings the backend back up. The scene is rebuilt at the next sync.
    fn lose_device(&mut self) {
        log::warn!("{:?}: graphics device lost, rebuilding", self.window);
        self.drop_resources();
        if let Err(e) = self.ensure_backend() {
            log::error!("{:?}: reinitialization failed: {e}", self.window);
        }
        self.shared.request_rebuild();
    }

    fn drop_resources(&mut self) {
        self.graph.sync.invalidate(&mut self.graph.nodes);
        self.last_plan.clear();
        if core::mem::take(&mut self.backend_ready) {
            self.backend.release();
        }
    }

    /// Polish and sync, then build the plan a render would draw. Nothing is
    /// handed to the backend.
    pub(crate) fn grab(&mut self, scene: &mut Scene) -> RenderPlan {
        self.prepare(scene);
        let polish = scene.polish(self.polish_loop_limit);
        self.run_jobs(RenderStage::BeforeSynchronizing);
        let report = self.graph.synchronize(scene);
        self.run_jobs(RenderStage::AfterSynchronizing);
        log::debug!(
            "{:?}: grab synced {} items ({} polished)",
            self.window,
            report.stats.items,
            polish.polished
        );
        RenderPlan::build(&self.graph.nodes, self.window)
    }

    /// Releases the node graph and device resources. The scene is rebuilt
    /// from scratch at the next sync.
    pub(crate) fn release(&mut self) {
        log::debug!("{:?}: releasing resources", self.window);
        self.drop_resources();
        self.shared.invalidate_scene.store(true, Ordering::Release);
    }

    /// Restores a consistent state after a panic in a frame.
    pub(crate) fn recover(&mut self) {
        self.summary = None;
        self.graph.sync.invalidate(&mut self.graph.nodes);
        self.last_plan.clear();
        self.shared.request_rebuild();
    }

    /// Runs every pending render job and releases resources. Idempotent.
    pub(crate) fn shutdown(&mut self) {
        if core::mem::replace(&mut self.shut_down, true) {
            return;
        }
        let jobs = self.jobs.lock().take_all();
        for job in jobs {
            job(&mut self.graph.nodes);
        }
        self.drop_resources();
        log::debug!("{:?}: render side shut down", self.window);
    }
}
