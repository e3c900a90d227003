// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Item tree data model.
//!
//! An *item* is a node in the retained scene tree. Each item has:
//!
//! - An identity ([`ItemId`]): a generational handle that becomes stale when
//!   the item is destroyed, preventing use-after-free bugs at the API level.
//! - Topology: parent, first-child, and sibling links forming an ordered
//!   tree. Insertion order is the default paint order; z overrides it.
//! - **Local properties** set by the caller: geometry, z, scale, rotation,
//!   custom transforms, opacity, visibility, clip, [`ItemFlags`].
//! - **Inherited properties** recomputed lazily by
//!   [`refresh_inherited`](ItemTree::refresh_inherited): effective
//!   visibility, effective enabled state and the item-to-scene transform.
//! - An optional [`ItemDelegate`] supplying paint-node production, polish and
//!   event hooks.
//!
//! Items are stored in struct-of-arrays layout with index-based handles.
//!
//! # Dirty tracking
//!
//! Every mutator ORs the matching [`DirtyFlags`](crate::dirty::DirtyFlags)
//! into the item's pending mask and, if the item is part of the window,
//! queues it on the dirty list. Changes that affect how a parent orders its
//! children (z, visibility, effect references) also mark the parent.

mod delegate;
mod id;
mod inherited;
mod store;
mod traverse;

pub use delegate::{EventResponse, ItemContext, ItemDelegate, PaintNodeContext};
pub use id::{INVALID, ItemId};
pub use inherited::InheritedChanges;
pub use store::{ItemFlags, ItemTree, TransformOrigin};
pub use traverse::{Ancestors, Children};
