// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-threaded render loop.

use std::sync::Arc;

use arbor_core::scene::Scene;
use arbor_render::RenderPlan;
use parking_lot::Mutex;

use crate::config::LoopKind;
use crate::error::RenderError;
use crate::frame::{FrameOutcome, Renderer, Shared, expose, guarded};
use crate::jobs::{RenderJob, RenderJobQueue, RenderStage};
use crate::window::RenderLoop;

/// Runs polish, sync, render and present back to back on the calling
/// thread.
///
/// The scene lock is held for the whole frame. Nobody else can observe it
/// in between, so the barrier is trivially satisfied.
#[derive(Debug)]
pub struct BasicRenderLoop {
    scene: Arc<Mutex<Scene>>,
    shared: Arc<Shared>,
    jobs: Arc<Mutex<RenderJobQueue>>,
    renderer: Renderer,
}

impl BasicRenderLoop {
    pub(crate) fn new(
        scene: Arc<Mutex<Scene>>,
        shared: Arc<Shared>,
        jobs: Arc<Mutex<RenderJobQueue>>,
        renderer: Renderer,
    ) -> Self {
        Self {
            scene,
            shared,
            jobs,
            renderer,
        }
    }

    fn frame(&mut self) -> FrameOutcome {
        let mut scene = self.scene.lock();
        match self.renderer.sync(&mut scene) {
            FrameOutcome::Synced(info) => match self.renderer.render() {
                None => FrameOutcome::Presented(info),
                Some(reason) => FrameOutcome::Skipped(reason),
            },
            other => other,
        }
    }
}

impl RenderLoop for BasicRenderLoop {
    fn kind(&self) -> LoopKind {
        LoopKind::Basic
    }

    fn render_frame(&mut self) -> Result<FrameOutcome, RenderError> {
        guarded(|| self.frame()).inspect_err(|_| self.renderer.recover())
    }

    fn grab(&mut self) -> Result<RenderPlan, RenderError> {
        let scene = &self.scene;
        let renderer = &mut self.renderer;
        guarded(|| renderer.grab(&mut scene.lock())).inspect_err(|_| self.renderer.recover())
    }

    fn set_exposed(&mut self, exposed: bool) {
        expose(&self.scene, &self.shared, exposed);
    }

    fn schedule_render_job(&mut self, stage: RenderStage, job: RenderJob) {
        self.jobs.lock().schedule(stage, job);
    }

    fn release_resources(&mut self) -> Result<(), RenderError> {
        self.renderer.release();
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RenderError> {
        Ok(())
    }

    fn shutdown(&mut self) {
        self.renderer.shutdown();
    }
}

impl Drop for BasicRenderLoop {
    fn drop(&mut self) {
        self.renderer.shutdown();
    }
}
