// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render loop with a dedicated render thread.
//!
//! The GUI thread drives frames with blocking calls into the render thread:
//!
//! ```text
//!   GUI thread                         render thread
//!   ──────────                         ─────────────
//!   render_frame() ──── Frame ───────► lock scene
//!        (parked)                      polish, sync
//!                                      unlock scene
//!   returns ◄──────── Synced ───────── reply
//!   mutates scene                      build plan, render, present
//!   incubates                          waits for the next request
//! ```
//!
//! The reply is sent before any rendering happens, so GUI-side mutations
//! made after `render_frame` returns are never seen by the frame being
//! rendered. The render thread reads only its own node graph once the reply
//! is out.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use arbor_core::scene::Scene;
use arbor_render::RenderPlan;
use parking_lot::Mutex;

use crate::config::LoopKind;
use crate::error::RenderError;
use crate::frame::{FrameOutcome, Renderer, Shared, expose, guarded};
use crate::jobs::{RenderJob, RenderJobQueue, RenderStage};
use crate::rendezvous::{Requester, Responder, rendezvous};
use crate::window::RenderLoop;

#[derive(Debug)]
enum Request {
    Frame,
    Grab,
    Release,
    Flush,
}

#[derive(Debug)]
enum Response {
    Frame(Result<FrameOutcome, RenderError>),
    Grab(Result<RenderPlan, RenderError>),
    Done,
}

/// Renders on a background thread; the GUI thread blocks only for polish
/// and sync.
#[derive(Debug)]
pub struct ThreadedRenderLoop {
    scene: Arc<Mutex<Scene>>,
    shared: Arc<Shared>,
    jobs: Arc<Mutex<RenderJobQueue>>,
    requester: Option<Requester<Request, Response>>,
    thread: Option<JoinHandle<()>>,
}

impl ThreadedRenderLoop {
    pub(crate) fn spawn(
        scene: Arc<Mutex<Scene>>,
        shared: Arc<Shared>,
        jobs: Arc<Mutex<RenderJobQueue>>,
        renderer: Renderer,
        name: String,
    ) -> Result<Self, RenderError> {
        let (requester, responder) = rendezvous();
        let render_scene = Arc::clone(&scene);
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || serve(renderer, &render_scene, &responder))
            .map_err(|e| RenderError::Spawn(e.to_string()))?;
        Ok(Self {
            scene,
            shared,
            jobs,
            requester: Some(requester),
            thread: Some(thread),
        })
    }

    fn call(&self, request: Request) -> Result<Response, RenderError> {
        self.requester
            .as_ref()
            .ok_or(RenderError::RenderThreadGone)?
            .call(request)
            .map_err(|_| RenderError::RenderThreadGone)
    }
}

fn serve(mut renderer: Renderer, scene: &Mutex<Scene>, responder: &Responder<Request, Response>) {
    log::debug!("render thread started");
    while let Some((request, reply)) = responder.recv() {
        match request {
            Request::Frame => {
                let outcome = guarded(|| renderer.sync(&mut scene.lock()));
                if outcome.is_err() {
                    renderer.recover();
                }
                let render = matches!(outcome, Ok(FrameOutcome::Synced(_)));
                // Releases the GUI thread.
                reply.send(Response::Frame(outcome));
                if render && guarded(|| renderer.render()).is_err() {
                    renderer.recover();
                }
            }
            Request::Grab => {
                let plan = guarded(|| renderer.grab(&mut scene.lock()));
                if plan.is_err() {
                    renderer.recover();
                }
                reply.send(Response::Grab(plan));
            }
            Request::Release => {
                renderer.release();
                reply.send(Response::Done);
            }
            Request::Flush => reply.send(Response::Done),
        }
    }
    renderer.shutdown();
    log::debug!("render thread exiting");
}

impl RenderLoop for ThreadedRenderLoop {
    fn kind(&self) -> LoopKind {
        LoopKind::Threaded
    }

    fn render_frame(&mut self) -> Result<FrameOutcome, RenderError> {
        match self.call(Request::Frame)? {
            Response::Frame(outcome) => outcome,
            _ => Err(RenderError::RenderThreadGone),
        }
    }

    fn grab(&mut self) -> Result<RenderPlan, RenderError> {
        match self.call(Request::Grab)? {
            Response::Grab(plan) => plan,
            _ => Err(RenderError::RenderThreadGone),
        }
    }

    fn set_exposed(&mut self, exposed: bool) {
        // Never waits on the render thread; a frame being rendered checks
        // the flag before drawing.
        expose(&self.scene, &self.shared, exposed);
    }

    fn schedule_render_job(&mut self, stage: RenderStage, job: RenderJob) {
        self.jobs.lock().schedule(stage, job);
    }

    fn release_resources(&mut self) -> Result<(), RenderError> {
        self.call(Request::Release).map(drop)
    }

    fn flush(&mut self) -> Result<(), RenderError> {
        self.call(Request::Flush).map(drop)
    }

    fn shutdown(&mut self) {
        // Dropping the requester ends the serve loop.
        self.requester = None;
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log::error!("render thread panicked during shutdown");
        }
    }
}

impl Drop for ThreadedRenderLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}
