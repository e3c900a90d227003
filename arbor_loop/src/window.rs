// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-window facade applications drive.

use std::sync::Arc;

use arbor_core::scene::Scene;
use arbor_core::trace::TraceSink;
use arbor_core::window::WindowId;
use arbor_render::RenderPlan;
use kurbo::Size;
use parking_lot::{Mutex, MutexGuard};

use crate::backend::GraphicsBackend;
use crate::basic::BasicRenderLoop;
use crate::config::{LoopKind, RenderLoopConfig};
use crate::error::RenderError;
use crate::frame::{FrameOutcome, Renderer, Shared};
use crate::incubation::IncubationController;
use crate::jobs::{RenderJob, RenderJobQueue, RenderStage};
use crate::threaded::ThreadedRenderLoop;

/// Drives frames for one window.
///
/// Every method is called from the GUI thread.
pub trait RenderLoop: Send + core::fmt::Debug {
    /// Which loop this is.
    fn kind(&self) -> LoopKind;

    /// Polishes, syncs and renders one frame.
    ///
    /// Returns once the GUI thread may touch the scene again. For the
    /// threaded loop that is right after sync, while rendering continues in
    /// the background.
    fn render_frame(&mut self) -> Result<FrameOutcome, RenderError>;

    /// Polishes and syncs, then returns the plan a render would draw,
    /// without presenting.
    fn grab(&mut self) -> Result<RenderPlan, RenderError>;

    /// Shows or hides the window. A hidden window's frames are skipped, and
    /// a frame already synced is dropped instead of presented.
    fn set_exposed(&mut self, exposed: bool);

    /// Runs `job` on the rendering thread at `stage` of the next frame.
    /// Jobs still pending at shutdown run then.
    fn schedule_render_job(&mut self, stage: RenderStage, job: RenderJob);

    /// Drops the node graph and device resources, blocking until done. The
    /// next frame rebuilds everything.
    fn release_resources(&mut self) -> Result<(), RenderError>;

    /// Waits until the frame in flight, if any, has been presented.
    fn flush(&mut self) -> Result<(), RenderError>;

    /// Stops rendering, runs pending jobs and releases resources.
    fn shutdown(&mut self);
}

/// A window: its scene, the loop that renders it and the incubation that
/// runs between frames.
#[derive(Debug)]
pub struct Window {
    id: WindowId,
    config: RenderLoopConfig,
    scene: Arc<Mutex<Scene>>,
    shared: Arc<Shared>,
    render_loop: Box<dyn RenderLoop>,
    incubation: IncubationController,
}

impl Window {
    /// Creates a hidden, zero-sized window rendered by `backend`.
    pub fn new(
        id: WindowId,
        config: RenderLoopConfig,
        backend: Box<dyn GraphicsBackend>,
    ) -> Result<Self, RenderError> {
        Self::with_trace_sink(id, config, backend, None)
    }

    /// Like [`new`](Self::new), reporting frame events to `sink` from the
    /// rendering thread.
    pub fn with_trace_sink(
        id: WindowId,
        config: RenderLoopConfig,
        backend: Box<dyn GraphicsBackend>,
        sink: Option<Box<dyn TraceSink + Send>>,
    ) -> Result<Self, RenderError> {
        let scene = Arc::new(Mutex::new(Scene::new(id)));
        let shared = Arc::new(Shared::new());
        let jobs = Arc::new(Mutex::new(RenderJobQueue::default()));
        let renderer = Renderer::new(
            id,
            &config,
            backend,
            sink,
            Arc::clone(&jobs),
            Arc::clone(&shared),
        );
        let render_loop: Box<dyn RenderLoop> = match config.kind {
            LoopKind::Basic => Box::new(BasicRenderLoop::new(
                Arc::clone(&scene),
                Arc::clone(&shared),
                jobs,
                renderer,
            )),
            LoopKind::Threaded => Box::new(ThreadedRenderLoop::spawn(
                Arc::clone(&scene),
                Arc::clone(&shared),
                jobs,
                renderer,
                format!("arbor-render-{}", id.0),
            )?),
        };
        log::debug!("{id:?}: created with {:?} render loop", config.kind);
        Ok(Self {
            id,
            config,
            scene,
            shared,
            render_loop,
            incubation: IncubationController::with_incubation_time(config.incubation_time()),
        })
    }

    /// The window's id.
    #[must_use]
    pub const fn id(&self) -> WindowId {
        self.id
    }

    /// The configuration the window was created with.
    #[must_use]
    pub const fn config(&self) -> &RenderLoopConfig {
        &self.config
    }

    /// Which loop renders this window.
    #[must_use]
    pub fn loop_kind(&self) -> LoopKind {
        self.render_loop.kind()
    }

    /// Locks the scene for mutation.
    ///
    /// The guard borrows the window, so it cannot be held across
    /// [`render_frame`](Self::render_frame).
    pub fn scene(&self) -> MutexGuard<'_, Scene> {
        self.scene.lock()
    }

    /// Resizes the window and requests a frame.
    pub fn set_size(&mut self, size: Size) {
        let mut scene = self.scene.lock();
        scene.set_size(size);
        scene.request_update();
    }

    /// Shows or hides the window. Showing requests a frame.
    pub fn set_exposed(&mut self, exposed: bool) {
        self.render_loop.set_exposed(exposed);
    }

    /// Requests a frame even if nothing is dirty.
    pub fn update(&mut self) {
        self.scene.lock().request_update();
    }

    /// Whether calling [`render_frame`](Self::render_frame) would do
    /// anything: the scene has pending work, the render side lost its
    /// resources, or incubation is in progress.
    #[must_use]
    pub fn needs_frame(&self) -> bool {
        self.shared.frame_requested()
            || !self.incubation.is_idle()
            || self.scene.lock().needs_frame()
    }

    /// Renders a frame, then spends the incubation budget.
    pub fn render_frame(&mut self) -> Result<FrameOutcome, RenderError> {
        let outcome = self.render_loop.render_frame()?;
        if self.config.incubation && !self.incubation.is_idle() {
            let budget = self.incubation.incubation_time();
            let mut scene = self.scene.lock();
            self.incubation.incubate_for(&mut scene, budget);
        }
        Ok(outcome)
    }

    /// Polishes and syncs, then returns what a render would draw without
    /// presenting it.
    pub fn grab(&mut self) -> Result<RenderPlan, RenderError> {
        self.render_loop.grab()
    }

    /// Runs `job` on the rendering thread at `stage` of the next frame.
    pub fn schedule_render_job(
        &mut self,
        stage: RenderStage,
        job: impl FnOnce(&mut arbor_core::node::NodeGraph) + Send + 'static,
    ) {
        self.render_loop.schedule_render_job(stage, Box::new(job));
    }

    /// Drops the node graph and device resources, blocking until the
    /// rendering thread is done. The next frame rebuilds everything.
    pub fn release_resources(&mut self) -> Result<(), RenderError> {
        self.render_loop.release_resources()
    }

    /// Waits for the frame in flight to be presented.
    pub fn flush(&mut self) -> Result<(), RenderError> {
        self.render_loop.flush()
    }

    /// The incubation queue.
    pub fn incubation_controller(&mut self) -> &mut IncubationController {
        &mut self.incubation
    }

    /// Stops the render loop. Pending render jobs run before it returns.
    pub fn shutdown(mut self) {
        self.render_loop.shutdown();
    }
}
