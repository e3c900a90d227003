// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render loop configuration.
//!
//! Settings come from code, or from the environment via
//! [`RenderLoopConfig::from_env`]:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `ARBOR_RENDER_LOOP` | `basic` or `threaded` |
//! | `ARBOR_POLISH_LOOP_LIMIT` | consecutive re-polish calls before a pass is abandoned |
//! | `ARBOR_FRAME_INTERVAL_MS` | expected frame interval, used to budget incubation |
//!
//! Unparsable values are logged and ignored.

use core::str::FromStr;
use core::time::Duration;

use arbor_core::polish::DEFAULT_POLISH_LOOP_LIMIT;
use arbor_core::sync::SyncConfig;

use crate::error::ConfigError;

/// Which render loop drives a window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoopKind {
    /// Polish, sync and render all run on the calling thread.
    Basic,
    /// Rendering runs on a dedicated thread. The calling thread blocks only
    /// while polish and sync run.
    #[default]
    Threaded,
}

impl FromStr for LoopKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "threaded" => Ok(Self::Threaded),
            _ => Err(ConfigError::UnknownLoop(s.to_owned())),
        }
    }
}

/// Settings shared by both render loops.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderLoopConfig {
    /// Which loop to run.
    pub kind: LoopKind,
    /// Consecutive re-scheduling polish calls after which the polish pass is
    /// abandoned for the frame.
    pub polish_loop_limit: usize,
    /// Expected time between frames.
    pub frame_interval: Duration,
    /// Whether incubation runs between frames.
    pub incubation: bool,
    /// Sync engine settings.
    pub sync: SyncConfig,
}

impl Default for RenderLoopConfig {
    fn default() -> Self {
        Self {
            kind: LoopKind::default(),
            polish_loop_limit: DEFAULT_POLISH_LOOP_LIMIT,
            frame_interval: Duration::from_micros(16_667),
            incubation: true,
            sync: SyncConfig::default(),
        }
    }
}

impl RenderLoopConfig {
    /// Defaults overridden by `ARBOR_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    #[must_use]
    pub fn from_lookup(mut lookup: impl FnMut(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup("ARBOR_RENDER_LOOP") {
            match value.parse() {
                Ok(kind) => config.kind = kind,
                Err(e) => log::warn!("ignoring ARBOR_RENDER_LOOP: {e}"),
            }
        }
        match parse_number("ARBOR_POLISH_LOOP_LIMIT", lookup("ARBOR_POLISH_LOOP_LIMIT")) {
            Ok(Some(limit)) if limit > 0 => config.polish_loop_limit = limit,
            Ok(Some(_)) => log::warn!("ignoring ARBOR_POLISH_LOOP_LIMIT: must be positive"),
            Ok(None) => {}
            Err(e) => log::warn!("ignoring ARBOR_POLISH_LOOP_LIMIT: {e}"),
        }
        match parse_number::<u64>("ARBOR_FRAME_INTERVAL_MS", lookup("ARBOR_FRAME_INTERVAL_MS")) {
            Ok(Some(ms)) if ms > 0 => config.frame_interval = Duration::from_millis(ms),
            Ok(Some(_)) => log::warn!("ignoring ARBOR_FRAME_INTERVAL_MS: must be positive"),
            Ok(None) => {}
            Err(e) => log::warn!("ignoring ARBOR_FRAME_INTERVAL_MS: {e}"),
        }
        config
    }

    /// Time the GUI thread may spend incubating after a frame.
    ///
    /// A third of the frame interval, but at least a millisecond. The basic
    /// loop gets twice that, since rendering already happened on the same
    /// thread and nothing else competes for it until the next frame.
    #[must_use]
    pub fn incubation_time(&self) -> Duration {
        let slice = (self.frame_interval / 3).max(Duration::from_millis(1));
        match self.kind {
            LoopKind::Basic => slice * 2,
            LoopKind::Threaded => slice,
        }
    }
}

fn parse_number<T: FromStr>(
    key: &'static str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { key, value })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl FnMut(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_owned())
        }
    }

    #[test]
    fn loop_kind_parses_case_insensitively() {
        assert_eq!("Basic".parse(), Ok(LoopKind::Basic));
        assert_eq!(" threaded ".parse(), Ok(LoopKind::Threaded));
        assert!(matches!(
            "windows".parse::<LoopKind>(),
            Err(ConfigError::UnknownLoop(_))
        ));
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = RenderLoopConfig::from_lookup(lookup(&[
            ("ARBOR_RENDER_LOOP", "basic"),
            ("ARBOR_POLISH_LOOP_LIMIT", "12"),
            ("ARBOR_FRAME_INTERVAL_MS", "30"),
        ]));
        assert_eq!(config.kind, LoopKind::Basic);
        assert_eq!(config.polish_loop_limit, 12);
        assert_eq!(config.frame_interval, Duration::from_millis(30));
    }

    #[test]
    fn bad_values_keep_defaults() {
        let config = RenderLoopConfig::from_lookup(lookup(&[
            ("ARBOR_RENDER_LOOP", "fast"),
            ("ARBOR_POLISH_LOOP_LIMIT", "0"),
            ("ARBOR_FRAME_INTERVAL_MS", "soon"),
        ]));
        assert_eq!(config, RenderLoopConfig::default());
    }

    #[test]
    fn incubation_time_is_a_third_of_the_interval() {
        let mut config = RenderLoopConfig {
            frame_interval: Duration::from_millis(30),
            ..RenderLoopConfig::default()
        };
        assert_eq!(config.incubation_time(), Duration::from_millis(10));
        config.kind = LoopKind::Basic;
        assert_eq!(config.incubation_time(), Duration::from_millis(20));
        config.frame_interval = Duration::from_micros(600);
        assert_eq!(config.incubation_time(), Duration::from_millis(2));
    }
}
