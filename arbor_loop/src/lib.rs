// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render loops for arbor scenes.
//!
//! A [`Window`] owns a [`Scene`](arbor_core::scene::Scene) behind a lock and
//! a [`RenderLoop`] that turns it into frames:
//!
//! - [`BasicRenderLoop`]: polish, sync, render and present on the calling
//!   thread.
//! - [`ThreadedRenderLoop`]: a dedicated render thread. The GUI thread is
//!   parked only while polish and sync run; rendering overlaps with the
//!   GUI thread's next batch of work.
//!
//! Which one a window uses comes from [`RenderLoopConfig`], optionally read
//! from the environment.
//!
//! Rendering goes through a [`GraphicsBackend`]. [`HeadlessBackend`] records
//! frames instead of drawing them.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): forwards frame events to the window's
//!   trace sink.
//! - `trace-rich` (disabled by default, implies `trace`): also reports the
//!   items drained by each sync pass.

mod backend;
mod basic;
mod config;
mod error;
mod frame;
mod incubation;
mod jobs;
mod rendezvous;
mod threaded;
mod window;

pub use backend::{GraphicsBackend, HeadlessBackend, HeadlessProbe, RecordedFrame};
pub use basic::BasicRenderLoop;
pub use config::{LoopKind, RenderLoopConfig};
pub use error::{BackendError, ConfigError, RenderError};
pub use frame::{FrameInfo, FrameOutcome};
pub use incubation::{IncubationController, IncubationStatus, Incubator};
pub use jobs::{RenderJob, RenderStage};
pub use threaded::ThreadedRenderLoop;
pub use window::{RenderLoop, Window};
