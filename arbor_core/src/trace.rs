// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the frame cycle.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that
//! render loops call at each stage of a frame. All method bodies default to
//! no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! [`FrameSummaryBuilder`] collects phase timestamps during a frame and
//! produces a [`FrameSummary`] at the end.
//!
//! Timestamps are nanoseconds on a monotonic clock chosen by the caller;
//! only differences between them are meaningful.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates [`ItemChange`] events and the
//!   corresponding `TraceSink` method.

#[cfg(feature = "trace-rich")]
use crate::dirty::DirtyFlags;
use crate::polish::PolishReport;
use crate::sync::SyncStats;
use crate::window::WindowId;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of the frame cycle is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Polish pass over queued items.
    Polish,
    /// Dirty-node reconciliation into the node graph.
    Sync,
    /// Walking the node graph and issuing backend work.
    Render,
    /// Handing the finished frame to the display.
    Present,
}

impl PhaseKind {
    /// Lower-case name, for log lines and trace files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Polish => "polish",
            Self::Sync => "sync",
            Self::Render => "render",
            Self::Present => "present",
        }
    }
}

/// Why a frame ended without presenting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The window was hidden or had zero size when rendering started.
    NotRenderable,
    /// The graphics device was lost; the next frame rebuilds everything.
    DeviceLost,
    /// The backend or a render job failed.
    Failed,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a frame cycle starts.
#[derive(Clone, Copy, Debug)]
pub struct FrameBeginEvent {
    /// Monotonic frame counter.
    pub frame_index: u64,
    /// Window the frame belongs to.
    pub window: WindowId,
    /// Start of the frame.
    pub timestamp_ns: u64,
}

/// Marks the beginning of a phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Start of the phase.
    pub timestamp_ns: u64,
}

/// Marks the end of a phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// End of the phase.
    pub timestamp_ns: u64,
}

/// Emitted after the polish pass.
#[derive(Clone, Copy, Debug)]
pub struct PolishEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// What the pass did.
    pub report: PolishReport,
}

/// Emitted after sync.
#[derive(Clone, Copy, Debug)]
pub struct SyncEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// What reconciliation did.
    pub stats: SyncStats,
}

/// Emitted when a frame ends without presenting.
#[derive(Clone, Copy, Debug)]
pub struct FrameSkippedEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Why.
    pub reason: SkipReason,
}

/// Emitted after a frame was presented.
#[derive(Clone, Copy, Debug)]
pub struct PresentEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// When presenting finished.
    pub presented_at_ns: u64,
}

/// Per-frame timing summary produced by [`FrameSummaryBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSummary {
    /// Frame counter.
    pub frame_index: u64,
    /// Window.
    pub window: WindowId,
    /// Polish duration in nanoseconds (0 if not measured).
    pub polish_ns: u64,
    /// Sync duration in nanoseconds (0 if not measured).
    pub sync_ns: u64,
    /// Render duration in nanoseconds (0 if not measured).
    pub render_ns: u64,
    /// Present duration in nanoseconds (0 if not measured).
    pub present_ns: u64,
    /// Whether the frame was skipped.
    pub skipped: bool,
}

/// One item drained from the dirty list.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct ItemChange {
    /// Slot index of the item.
    pub item_index: u32,
    /// Flags it was drained with.
    pub flags: DirtyFlags,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from a render loop.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a frame cycle starts.
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        _ = e;
    }

    /// Called at the beginning of a phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called after the polish pass.
    fn on_polish(&mut self, e: &PolishEvent) {
        _ = e;
    }

    /// Called after sync.
    fn on_sync(&mut self, e: &SyncEvent) {
        _ = e;
    }

    /// Called when a frame is skipped.
    fn on_frame_skipped(&mut self, e: &FrameSkippedEvent) {
        _ = e;
    }

    /// Called after presenting.
    fn on_present(&mut self, e: &PresentEvent) {
        _ = e;
    }

    /// Called with a per-frame timing summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }

    /// Called with the items drained by sync (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_item_changes(&mut self, frame_index: u64, changes: &[ItemChange]) {
        _ = (frame_index, changes);
    }
}

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! forward {
    ($(#[$doc:meta])* $name:ident => $method:ident($ty:ty)) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(&mut self, e: &$ty) {
            #[cfg(feature = "trace")]
            if let Some(s) = &mut self.sink {
                s.$method(e);
            }
            #[cfg(not(feature = "trace"))]
            {
                _ = e;
            }
        }
    };
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    forward!(
        /// Emits a [`FrameBeginEvent`].
        frame_begin => on_frame_begin(FrameBeginEvent)
    );
    forward!(
        /// Emits a [`PhaseBeginEvent`].
        phase_begin => on_phase_begin(PhaseBeginEvent)
    );
    forward!(
        /// Emits a [`PhaseEndEvent`].
        phase_end => on_phase_end(PhaseEndEvent)
    );
    forward!(
        /// Emits a [`PolishEvent`].
        polish => on_polish(PolishEvent)
    );
    forward!(
        /// Emits a [`SyncEvent`].
        sync => on_sync(SyncEvent)
    );
    forward!(
        /// Emits a [`FrameSkippedEvent`].
        frame_skipped => on_frame_skipped(FrameSkippedEvent)
    );
    forward!(
        /// Emits a [`PresentEvent`].
        present => on_present(PresentEvent)
    );
    forward!(
        /// Emits a [`FrameSummary`].
        frame_summary => on_frame_summary(FrameSummary)
    );

    /// Emits drained items (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn item_changes(&mut self, frame_index: u64, changes: &[ItemChange]) {
        if let Some(s) = &mut self.sink {
            s.on_item_changes(frame_index, changes);
        }
    }
}

// ---------------------------------------------------------------------------
// FrameSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects phase timestamps during a frame and produces a [`FrameSummary`].
#[derive(Debug)]
pub struct FrameSummaryBuilder {
    frame_index: u64,
    window: WindowId,
    phase_starts: [Option<u64>; 4],
    phase_ends: [Option<u64>; 4],
    skipped: bool,
}

impl FrameSummaryBuilder {
    /// Starts building a summary for the given frame.
    #[must_use]
    pub fn new(begin: &FrameBeginEvent) -> Self {
        Self {
            frame_index: begin.frame_index,
            window: begin.window,
            phase_starts: [None; 4],
            phase_ends: [None; 4],
            skipped: false,
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, t_ns: u64) {
        self.phase_starts[phase_index(phase)] = Some(t_ns);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, t_ns: u64) {
        self.phase_ends[phase_index(phase)] = Some(t_ns);
    }

    /// Marks the frame as skipped.
    pub fn set_skipped(&mut self, skipped: bool) {
        self.skipped = skipped;
    }

    /// Consumes the builder and produces the final [`FrameSummary`].
    #[must_use]
    pub fn finish(self) -> FrameSummary {
        FrameSummary {
            frame_index: self.frame_index,
            window: self.window,
            polish_ns: self.phase_duration(PhaseKind::Polish),
            sync_ns: self.phase_duration(PhaseKind::Sync),
            render_ns: self.phase_duration(PhaseKind::Render),
            present_ns: self.phase_duration(PhaseKind::Present),
            skipped: self.skipped,
        }
    }

    fn phase_duration(&self, phase: PhaseKind) -> u64 {
        let idx = phase_index(phase);
        match (self.phase_starts[idx], self.phase_ends[idx]) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        }
    }
}

const fn phase_index(phase: PhaseKind) -> usize {
    match phase {
        PhaseKind::Polish => 0,
        PhaseKind::Sync => 1,
        PhaseKind::Render => 2,
        PhaseKind::Present => 3,
    }
}
