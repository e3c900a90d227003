// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render-node graph.
//!
//! The node graph is the low-level mirror of the item tree that renderers
//! walk. Each item that is part of a window owns a short chain of nodes, in
//! this fixed order:
//!
//! ```text
//! Transform ─▶ [Opacity] ─▶ [Clip] ─▶ [EffectRoot] ─▶ { Paint, child Transforms… }
//! ```
//!
//! Bracketed layers exist only when needed. The last node of the chain is the
//! item's *child container*: it holds the item's paint node and the transform
//! nodes of its children, in paint order.
//!
//! The graph is mutated exclusively by the [sync engine](crate::sync) and read
//! by renderers between syncs. Node handles are stable for the lifetime of a
//! node, and every mutation records [`NodeDirtyFlags`] that renderers collect
//! with [`NodeGraph::take_dirty`].

mod graph;
mod id;

pub use graph::{NodeChildren, NodeDirtyFlags, NodeGraph, NodeKind, PaintContent};
pub use id::{ContentKey, NodeId};

use alloc::string::String;

/// Failure reported by an item delegate while producing its paint node.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PaintError {
    /// The delegate could not produce content.
    #[error("paint node production failed: {0}")]
    Failed(String),
    /// The delegate returned a handle that is not a live paint node.
    #[error("delegate returned {0:?}, which is not a live paint node")]
    NotAPaintNode(NodeId),
}
