//! Refresh signalling between the app and the widget.
//!
//! The widget re-renders on a fixed interval, or sooner when the canonical
//! side (or its own completion) raises the signal generation.

use crate::clock::MS_PER_SECOND;
use serde::{Deserialize, Serialize};

pub const DEFAULT_REFRESH_INTERVAL_SECONDS: i64 = 60;

/// Monotonic counter raised whenever the projection changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSignal {
    pub generation: u64,
    pub requested_at: Option<i64>,
}

impl RefreshSignal {
    pub fn next(self, now_ms: i64) -> Self {
        Self {
            generation: self.generation.wrapping_add(1),
            requested_at: Some(now_ms),
        }
    }
}

/// What the widget last rendered, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderMark {
    pub generation: u64,
    pub rendered_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    interval_ms: i64,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::every_seconds(DEFAULT_REFRESH_INTERVAL_SECONDS)
    }
}

impl RefreshPolicy {
    /// Non-positive intervals fall back to one second.
    pub fn every_seconds(seconds: i64) -> Self {
        Self {
            interval_ms: seconds.max(1).saturating_mul(MS_PER_SECOND),
        }
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    pub fn next_refresh_at(&self, mark: &RenderMark) -> i64 {
        mark.rendered_at.saturating_add(self.interval_ms)
    }

    pub fn is_due(&self, last: Option<&RenderMark>, signal: &RefreshSignal, now_ms: i64) -> bool {
        match last {
            None => true,
            Some(mark) => mark.generation != signal.generation || now_ms >= self.next_refresh_at(mark),
        }
    }
}
