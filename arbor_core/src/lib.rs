// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Item tree, dirty tracking and render-node synchronization.
//!
//! `arbor_core` holds the retained scene description of a window and the
//! machinery that mirrors it into a render-node graph once per frame. It is
//! `no_std` compatible (with `alloc`) and stores both trees in
//! struct-of-arrays form addressed by generational handles.
//!
//! # Architecture
//!
//! ```text
//!   input ──► DeliveryAgent ──┐
//!                             ▼
//!   application ─────────► ItemTree ──(mark)──► DirtyList
//!                             │                     │
//!                    polish_items()                 │ drain
//!                             │                     ▼
//!                             └──────────► SyncEngine::synchronize()
//!                                                   │
//!                                                   ▼
//!                                              NodeGraph ──► renderer
//! ```
//!
//! **[`item`]**: struct-of-arrays item tree with generational handles, item
//! delegates, and inherited state (effective visibility, enabled state and
//! scene transforms) propagated through `understory_dirty` channels.
//!
//! **[`dirty`]**: per-item dirty flags and the intrusive dirty list drained
//! once per sync pass.
//!
//! **[`node`]**: the render-node graph. Each item owns a chain of transform,
//! opacity, clip and effect-root layers plus an optional paint node.
//!
//! **[`sync`]**: the engine that reconciles dirty items into the node graph
//! while keeping node identity stable across frames.
//!
//! **[`polish`]**: the pre-sync polish queue and its loop detector.
//!
//! **[`delivery`]**: pointer and key delivery with grab, hover and focus
//! bookkeeping.
//!
//! **[`scene`]**: per-window GUI-side and render-side state bundles.
//!
//! **[`transform`]**: 4×4 column-major transform used for item matrices.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! frame instrumentation, with zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies. A
//!   delegate callback that panics then leaves its delegate installed, so the
//!   item keeps working once the panic has been caught further up.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-item
//!   change events and keeps drained entries in sync reports.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod delivery;
pub mod dirty;
pub mod item;
pub mod node;
pub mod polish;
pub mod scene;
pub mod sync;
pub mod trace;
pub mod transform;
pub mod window;
