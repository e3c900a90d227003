// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render-plan construction and damage tracking for arbor.
//!
//! This crate is the renderer-side reader of [`arbor_core`]'s node graph.
//! It defines:
//!
//! - [`RenderItem`]: a single draw command with its accumulated matrix,
//!   opacity and clip
//! - [`RenderPlan`]: the draw commands of one frame in back-to-front order
//! - [`DamageRegion`]: the part of the window a frame has to redraw

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

mod damage;
mod plan;

pub use damage::DamageRegion;
pub use plan::{RenderItem, RenderPlan};
