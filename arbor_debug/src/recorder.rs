// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! Polish events keep only the counters, and item-change events
//! ([`on_item_changes`](TraceSink::on_item_changes)) only their count.

use arbor_core::sync::SyncStats;
use arbor_core::trace::{
    FrameBeginEvent, FrameSkippedEvent, FrameSummary, ItemChange, PhaseBeginEvent, PhaseEndEvent,
    PhaseKind, PolishEvent, PresentEvent, SkipReason, SyncEvent, TraceSink,
};
use arbor_core::window::WindowId;

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_FRAME_BEGIN: u8 = 1;
const TAG_PHASE_BEGIN: u8 = 2;
const TAG_PHASE_END: u8 = 3;
const TAG_POLISH: u8 = 4;
const TAG_SYNC: u8 = 5;
const TAG_FRAME_SKIPPED: u8 = 6;
const TAG_PRESENT: u8 = 7;
const TAG_FRAME_SUMMARY: u8 = 8;
const TAG_ITEM_CHANGES_COUNT: u8 = 9;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_count(&mut self, v: usize) {
        self.write_u64(u64::try_from(v).unwrap_or(u64::MAX));
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Polish => 0,
            PhaseKind::Sync => 1,
            PhaseKind::Render => 2,
            PhaseKind::Present => 3,
        });
    }

    fn write_reason(&mut self, r: SkipReason) {
        self.write_u8(match r {
            SkipReason::NotRenderable => 0,
            SkipReason::DeviceLost => 1,
            SkipReason::Failed => 2,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        self.write_u8(TAG_FRAME_BEGIN);
        self.write_u64(e.frame_index);
        self.write_u32(e.window.0);
        self.write_u64(e.timestamp_ns);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp_ns);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp_ns);
    }

    fn on_polish(&mut self, e: &PolishEvent) {
        self.write_u8(TAG_POLISH);
        self.write_u64(e.frame_index);
        self.write_count(e.report.polished);
        self.write_u8(u8::from(e.report.aborted));
    }

    fn on_sync(&mut self, e: &SyncEvent) {
        let s = e.stats;
        self.write_u8(TAG_SYNC);
        self.write_u64(e.frame_index);
        for count in [
            s.items,
            s.released,
            s.created,
            s.destroyed,
            s.inserted,
            s.removed,
            s.paint_updates,
        ] {
            self.write_count(count);
        }
    }

    fn on_frame_skipped(&mut self, e: &FrameSkippedEvent) {
        self.write_u8(TAG_FRAME_SKIPPED);
        self.write_u64(e.frame_index);
        self.write_reason(e.reason);
    }

    fn on_present(&mut self, e: &PresentEvent) {
        self.write_u8(TAG_PRESENT);
        self.write_u64(e.frame_index);
        self.write_u64(e.presented_at_ns);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.write_u8(TAG_FRAME_SUMMARY);
        self.write_u64(s.frame_index);
        self.write_u32(s.window.0);
        self.write_u64(s.polish_ns);
        self.write_u64(s.sync_ns);
        self.write_u64(s.render_ns);
        self.write_u64(s.present_ns);
        self.write_u8(u8::from(s.skipped));
    }

    fn on_item_changes(&mut self, frame_index: u64, changes: &[ItemChange]) {
        self.write_u8(TAG_ITEM_CHANGES_COUNT);
        self.write_u64(frame_index);
        self.write_u32(u32::try_from(changes.len()).unwrap_or(u32::MAX));
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`FrameBeginEvent`].
    FrameBegin(FrameBeginEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// Counters of a [`PolishEvent`].
    Polish {
        /// Frame counter.
        frame_index: u64,
        /// Number of `update_polish` calls.
        polished: u64,
        /// Whether the loop detector cut the pass short.
        aborted: bool,
    },
    /// A [`SyncEvent`].
    Sync(SyncEvent),
    /// A [`FrameSkippedEvent`].
    FrameSkipped(FrameSkippedEvent),
    /// A [`PresentEvent`].
    Present(PresentEvent),
    /// A [`FrameSummary`].
    FrameSummary(FrameSummary),
    /// Number of items drained in a frame's sync pass.
    ItemChangesCount {
        /// Frame counter.
        frame_index: u64,
        /// Number of drained items.
        count: u32,
    },
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?;
        self.pos += N;
        bytes.try_into().ok()
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_count(&mut self) -> Option<usize> {
        usize::try_from(self.read_u64()?).ok()
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::Polish,
            1 => PhaseKind::Sync,
            2 => PhaseKind::Render,
            3 => PhaseKind::Present,
            _ => return None,
        })
    }

    fn read_reason(&mut self) -> Option<SkipReason> {
        Some(match self.read_u8()? {
            0 => SkipReason::NotRenderable,
            1 => SkipReason::DeviceLost,
            2 => SkipReason::Failed,
            _ => return None,
        })
    }

    fn decode_sync(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Sync(SyncEvent {
            frame_index: self.read_u64()?,
            stats: SyncStats {
                items: self.read_count()?,
                released: self.read_count()?,
                created: self.read_count()?,
                destroyed: self.read_count()?,
                inserted: self.read_count()?,
                removed: self.read_count()?,
                paint_updates: self.read_count()?,
            },
        }))
    }

    fn decode_frame_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameSummary(FrameSummary {
            frame_index: self.read_u64()?,
            window: WindowId(self.read_u32()?),
            polish_ns: self.read_u64()?,
            sync_ns: self.read_u64()?,
            render_ns: self.read_u64()?,
            present_ns: self.read_u64()?,
            skipped: self.read_u8()? != 0,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_FRAME_BEGIN => Some(RecordedEvent::FrameBegin(FrameBeginEvent {
                frame_index: self.read_u64()?,
                window: WindowId(self.read_u32()?),
                timestamp_ns: self.read_u64()?,
            })),
            TAG_PHASE_BEGIN => Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
                frame_index: self.read_u64()?,
                phase: self.read_phase()?,
                timestamp_ns: self.read_u64()?,
            })),
            TAG_PHASE_END => Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
                frame_index: self.read_u64()?,
                phase: self.read_phase()?,
                timestamp_ns: self.read_u64()?,
            })),
            TAG_POLISH => Some(RecordedEvent::Polish {
                frame_index: self.read_u64()?,
                polished: self.read_u64()?,
                aborted: self.read_u8()? != 0,
            }),
            TAG_SYNC => self.decode_sync(),
            TAG_FRAME_SKIPPED => Some(RecordedEvent::FrameSkipped(FrameSkippedEvent {
                frame_index: self.read_u64()?,
                reason: self.read_reason()?,
            })),
            TAG_PRESENT => Some(RecordedEvent::Present(PresentEvent {
                frame_index: self.read_u64()?,
                presented_at_ns: self.read_u64()?,
            })),
            TAG_FRAME_SUMMARY => self.decode_frame_summary(),
            TAG_ITEM_CHANGES_COUNT => Some(RecordedEvent::ItemChangesCount {
                frame_index: self.read_u64()?,
                count: self.read_u32()?,
            }),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
