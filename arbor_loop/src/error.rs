// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for backends, render loops and configuration.

/// A failure reported by a [`GraphicsBackend`](crate::backend::GraphicsBackend).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The graphics device went away. Every node-owned resource is gone and
    /// the scene has to be rebuilt.
    #[error("graphics device lost")]
    DeviceLost,
    /// The backend could not be brought up.
    #[error("backend initialization failed: {0}")]
    Initialization(String),
    /// A frame could not be recorded or presented.
    #[error("frame failed: {0}")]
    Frame(String),
}

/// A failure surfaced to the GUI thread by a render loop.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The backend failed outside of a frame, e.g. while initializing.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The render thread could not be started.
    #[error("failed to spawn render thread: {0}")]
    Spawn(String),
    /// The render thread exited; no further frames can be produced.
    #[error("render thread is gone")]
    RenderThreadGone,
    /// An item callback or render job panicked. The node graph has been
    /// discarded and will be rebuilt on the next frame.
    #[error("render cycle panicked: {0}")]
    Panicked(String),
}

/// An invalid render loop setting.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The loop kind is neither `basic` nor `threaded`.
    #[error("unknown render loop `{0}`, expected `basic` or `threaded`")]
    UnknownLoop(String),
    /// A numeric setting did not parse.
    #[error("invalid value `{value}` for {key}")]
    InvalidNumber {
        /// Setting name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn core::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
