// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for graphics integrations.
//!
//! A render loop owns exactly one [`GraphicsBackend`] per window and only
//! ever calls it from the thread that renders. One frame is driven as
//!
//! ```text
//! begin_frame(size) -> render(plan, damage) -> present()
//! ```
//!
//! A grab stops after building the plan. Any call may report
//! [`BackendError::DeviceLost`]; the loop then discards the node graph,
//! calls [`release`](GraphicsBackend::release) followed by
//! [`initialize`](GraphicsBackend::initialize), and rebuilds the scene on
//! the next frame.
//!
//! [`HeadlessBackend`] draws nothing and records what it was asked to draw,
//! which is what tests and offscreen tooling need.

use std::sync::Arc;

use arbor_render::{DamageRegion, RenderPlan};
use kurbo::Size;
use parking_lot::Mutex;

use crate::error::BackendError;

/// Draws render plans to a surface.
pub trait GraphicsBackend: Send {
    /// Creates device resources. Called before the first frame and again
    /// after a device loss or a resource release.
    fn initialize(&mut self) -> Result<(), BackendError>;

    /// Starts recording a frame for a surface of the given size.
    fn begin_frame(&mut self, size: Size) -> Result<(), BackendError>;

    /// Records the plan's draw items.
    fn render(&mut self, plan: &RenderPlan, damage: &DamageRegion) -> Result<(), BackendError>;

    /// Hands the recorded frame to the display.
    fn present(&mut self) -> Result<(), BackendError>;

    /// Drops every device resource. The backend must accept
    /// [`initialize`](Self::initialize) afterwards.
    fn release(&mut self);
}

/// One frame as seen by a [`HeadlessBackend`].
#[derive(Clone, Debug)]
pub struct RecordedFrame {
    /// Surface size passed to `begin_frame`.
    pub size: Size,
    /// The plan passed to `render`.
    pub plan: RenderPlan,
    /// The damage passed to `render`.
    pub damage: DamageRegion,
}

#[derive(Debug, Default)]
struct ProbeState {
    presented: Vec<RecordedFrame>,
    initializations: usize,
    releases: usize,
    lose_device: bool,
    fail_initialization: bool,
}

/// Shared view into a [`HeadlessBackend`], usable from any thread.
#[derive(Clone, Debug, Default)]
pub struct HeadlessProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl HeadlessProbe {
    /// Every presented frame, oldest first.
    #[must_use]
    pub fn presented(&self) -> Vec<RecordedFrame> {
        self.state.lock().presented.clone()
    }

    /// The most recently presented frame.
    #[must_use]
    pub fn last_presented(&self) -> Option<RecordedFrame> {
        self.state.lock().presented.last().cloned()
    }

    /// Number of presented frames.
    #[must_use]
    pub fn presented_count(&self) -> usize {
        self.state.lock().presented.len()
    }

    /// Number of successful `initialize` calls.
    #[must_use]
    pub fn initializations(&self) -> usize {
        self.state.lock().initializations
    }

    /// Number of `release` calls.
    #[must_use]
    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }

    /// Makes the next `begin_frame` report a lost device.
    pub fn lose_device(&self) {
        self.state.lock().lose_device = true;
    }

    /// Makes every `initialize` fail until called again with `false`.
    pub fn set_fail_initialization(&self, fail: bool) {
        self.state.lock().fail_initialization = fail;
    }
}

/// A backend without a device.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    probe: HeadlessProbe,
    initialized: bool,
    pending: Option<RecordedFrame>,
}

impl HeadlessBackend {
    /// Creates an uninitialized backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle that observes and steers this backend.
    #[must_use]
    pub fn probe(&self) -> HeadlessProbe {
        self.probe.clone()
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn initialize(&mut self) -> Result<(), BackendError> {
        let mut state = self.probe.state.lock();
        if state.fail_initialization {
            return Err(BackendError::Initialization("injected failure".into()));
        }
        state.initializations += 1;
        self.initialized = true;
        Ok(())
    }

    fn begin_frame(&mut self, size: Size) -> Result<(), BackendError> {
        if !self.initialized {
            return Err(BackendError::Frame("backend not initialized".into()));
        }
        if core::mem::take(&mut self.probe.state.lock().lose_device) {
            self.pending = None;
            return Err(BackendError::DeviceLost);
        }
        self.pending = Some(RecordedFrame {
            size,
            plan: RenderPlan::default(),
            damage: DamageRegion::None,
        });
        Ok(())
    }

    fn render(&mut self, plan: &RenderPlan, damage: &DamageRegion) -> Result<(), BackendError> {
        let frame = self
            .pending
            .as_mut()
            .ok_or_else(|| BackendError::Frame("render outside of a frame".into()))?;
        frame.plan = plan.clone();
        frame.damage = damage.clone();
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        let frame = self
            .pending
            .take()
            .ok_or_else(|| BackendError::Frame("present outside of a frame".into()))?;
        self.probe.state.lock().presented.push(frame);
        Ok(())
    }

    fn release(&mut self) {
        self.pending = None;
        if core::mem::take(&mut self.initialized) {
            self.probe.state.lock().releases += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_presented_frames() {
        let mut backend = HeadlessBackend::new();
        let probe = backend.probe();
        backend.initialize().unwrap();
        backend.begin_frame(Size::new(4.0, 3.0)).unwrap();
        backend
            .render(&RenderPlan::default(), &DamageRegion::Full)
            .unwrap();
        assert_eq!(probe.presented_count(), 0);
        backend.present().unwrap();
        let frame = probe.last_presented().expect("presented");
        assert_eq!(frame.size, Size::new(4.0, 3.0));
        assert_eq!(frame.damage, DamageRegion::Full);
    }

    #[test]
    fn injected_device_loss_fires_once() {
        let mut backend = HeadlessBackend::new();
        let probe = backend.probe();
        backend.initialize().unwrap();
        probe.lose_device();
        assert_eq!(
            backend.begin_frame(Size::new(1.0, 1.0)),
            Err(BackendError::DeviceLost)
        );
        assert!(backend.begin_frame(Size::new(1.0, 1.0)).is_ok());
    }

    #[test]
    fn frames_need_initialization() {
        let mut backend = HeadlessBackend::new();
        assert!(backend.begin_frame(Size::new(1.0, 1.0)).is_err());
        backend.probe().set_fail_initialization(true);
        assert!(backend.initialize().is_err());
        backend.release();
        assert_eq!(backend.probe().releases(), 0);
    }
}
