// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are printed in microseconds.

use std::io::Write;

use arbor_core::trace::{
    FrameBeginEvent, FrameSkippedEvent, FrameSummary, ItemChange, PhaseBeginEvent, PhaseEndEvent,
    PolishEvent, PresentEvent, SyncEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write + Send>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer
    }
}

fn us(ns: u64) -> f64 {
    ns as f64 / 1000.0
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[frame] frame={} window={} at {:.1}µs",
            e.frame_index,
            e.window.0,
            us(e.timestamp_ns),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {} at {:.1}µs",
            e.frame_index,
            e.phase.name(),
            us(e.timestamp_ns),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {} at {:.1}µs",
            e.frame_index,
            e.phase.name(),
            us(e.timestamp_ns),
        );
    }

    fn on_polish(&mut self, e: &PolishEvent) {
        let status = if e.report.aborted { "LOOP" } else { "ok" };
        let _ = writeln!(
            self.writer,
            "[polish] frame={} polished={} {status}",
            e.frame_index, e.report.polished,
        );
    }

    fn on_sync(&mut self, e: &SyncEvent) {
        let s = e.stats;
        let _ = writeln!(
            self.writer,
            "[sync] frame={} items={} created={} destroyed={} inserted={} removed={} paint={}",
            e.frame_index,
            s.items,
            s.created,
            s.destroyed,
            s.inserted,
            s.removed,
            s.paint_updates,
        );
    }

    fn on_frame_skipped(&mut self, e: &FrameSkippedEvent) {
        let _ = writeln!(
            self.writer,
            "[skipped] frame={} reason={:?}",
            e.frame_index, e.reason,
        );
    }

    fn on_present(&mut self, e: &PresentEvent) {
        let _ = writeln!(
            self.writer,
            "[present] frame={} at {:.1}µs",
            e.frame_index,
            us(e.presented_at_ns),
        );
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let status = if s.skipped { "SKIPPED" } else { "ok" };
        let _ = writeln!(
            self.writer,
            "[summary] frame={} window={} polish={:.1}µs sync={:.1}µs \
             render={:.1}µs present={:.1}µs {status}",
            s.frame_index,
            s.window.0,
            us(s.polish_ns),
            us(s.sync_ns),
            us(s.render_ns),
            us(s.present_ns),
        );
    }

    fn on_item_changes(&mut self, frame_index: u64, changes: &[ItemChange]) {
        let _ = writeln!(
            self.writer,
            "[items] frame={frame_index} changes={}",
            changes.len(),
        );
    }
}
