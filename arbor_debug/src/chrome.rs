// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Each window becomes its own process row, so frames of several windows
//! recorded into one buffer stay apart.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::collections::HashMap;
use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    // Only frame-begin events carry the window; the rest inherit it.
    let mut windows: HashMap<u64, u32> = HashMap::new();
    let pid = |windows: &HashMap<u64, u32>, frame: u64| windows.get(&frame).copied().unwrap_or(0);

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::FrameBegin(e) => {
                windows.insert(e.frame_index, e.window.0);
                events.push(json!({
                    "ph": "i",
                    "name": "FrameBegin",
                    "cat": "Frame",
                    "ts": us(e.timestamp_ns),
                    "pid": e.window.0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::PhaseBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": e.phase.name(),
                    "cat": "Frame",
                    "ts": us(e.timestamp_ns),
                    "pid": pid(&windows, e.frame_index),
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": e.phase.name(),
                    "cat": "Frame",
                    "ts": us(e.timestamp_ns),
                    "pid": pid(&windows, e.frame_index),
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::Polish {
                frame_index,
                polished,
                aborted,
            } => {
                events.push(json!({
                    "ph": "i",
                    "name": "Polish",
                    "cat": "Items",
                    "ts": 0,
                    "pid": pid(&windows, frame_index),
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "frame_index": frame_index,
                        "polished": polished,
                        "aborted": aborted,
                    }
                }));
            }
            RecordedEvent::Sync(e) => {
                let s = e.stats;
                events.push(json!({
                    "ph": "i",
                    "name": "Sync",
                    "cat": "Items",
                    "ts": 0,
                    "pid": pid(&windows, e.frame_index),
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "frame_index": e.frame_index,
                        "items": s.items,
                        "released": s.released,
                        "created": s.created,
                        "destroyed": s.destroyed,
                        "inserted": s.inserted,
                        "removed": s.removed,
                        "paint_updates": s.paint_updates,
                    }
                }));
            }
            RecordedEvent::FrameSkipped(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "FrameSkipped",
                    "cat": "Frame",
                    "ts": 0,
                    "pid": pid(&windows, e.frame_index),
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "frame_index": e.frame_index,
                        "reason": format!("{:?}", e.reason),
                    }
                }));
            }
            RecordedEvent::Present(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Present",
                    "cat": "Frame",
                    "ts": us(e.presented_at_ns),
                    "pid": pid(&windows, e.frame_index),
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::FrameSummary(s) => {
                events.push(json!({
                    "ph": "i",
                    "name": "FrameSummary",
                    "cat": "Summary",
                    "ts": 0,
                    "pid": s.window.0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "frame_index": s.frame_index,
                        "polish_us": us(s.polish_ns),
                        "sync_us": us(s.sync_ns),
                        "render_us": us(s.render_ns),
                        "present_us": us(s.present_ns),
                        "skipped": s.skipped,
                    }
                }));
            }
            RecordedEvent::ItemChangesCount { frame_index, count } => {
                events.push(json!({
                    "ph": "i",
                    "name": "ItemChanges",
                    "cat": "Rich",
                    "ts": 0,
                    "pid": pid(&windows, frame_index),
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "frame_index": frame_index,
                        "count": count,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn us(ns: u64) -> f64 {
    ns as f64 / 1000.0
}
