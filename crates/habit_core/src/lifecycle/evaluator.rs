//! Pure lifecycle evaluator.
//!
//! Precedence: frozen, never started, then the elapsed-time windows
//! (on track, grace period, streak lost).

use crate::clock::MS_PER_SECOND;
use crate::model::habit::Habit;
use serde::{Deserialize, Serialize};

/// Derived display state of a habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisplayState {
    /// Inside the cadence window.
    OnTrack,
    /// Cadence window lapsed, streak at risk.
    GracePeriod,
    /// Explicitly protected until the next completion.
    Frozen,
    /// Grace window lapsed; the run is broken.
    StreakLost,
    /// No completion recorded yet.
    NeverStarted,
}

impl DisplayState {
    /// Stable wire tag shared with remote surfaces.
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::OnTrack => "onTrack",
            Self::GracePeriod => "gracePeriod",
            Self::Frozen => "frozen",
            Self::StreakLost => "streakLost",
            Self::NeverStarted => "neverStarted",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "onTrack" => Some(Self::OnTrack),
            "gracePeriod" => Some(Self::GracePeriod),
            "frozen" => Some(Self::Frozen),
            "streakLost" => Some(Self::StreakLost),
            "neverStarted" => Some(Self::NeverStarted),
            _ => None,
        }
    }

    /// On track or protected.
    pub fn is_healthy(self) -> bool {
        matches!(self, Self::OnTrack | Self::Frozen)
    }
}

/// Result of evaluating one habit at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub state: DisplayState,
    /// 1.0 right after a completion, 0.0 once the cadence window is spent.
    pub cadence_progress: f64,
    /// 1.0 until the grace window starts, 0.0 once it is spent.
    pub grace_progress: f64,
}

/// Evaluates `habit` at `now_ms`.
pub fn evaluate(habit: &Habit, now_ms: i64) -> Evaluation {
    let cadence = habit.cadence_seconds as f64;
    let grace = habit.grace_seconds as f64;
    let elapsed = elapsed_seconds(habit, now_ms);

    let state = if habit.is_frozen {
        DisplayState::Frozen
    } else {
        match elapsed {
            None => DisplayState::NeverStarted,
            Some(elapsed) if elapsed <= cadence => DisplayState::OnTrack,
            Some(elapsed) if elapsed <= cadence + grace => DisplayState::GracePeriod,
            Some(_) => DisplayState::StreakLost,
        }
    };

    let cadence_progress = if habit.is_frozen {
        1.0
    } else {
        elapsed.map_or(0.0, |elapsed| remaining_fraction(elapsed, cadence))
    };

    let grace_progress = match elapsed {
        None => 0.0,
        Some(elapsed) if elapsed <= cadence => 1.0,
        Some(elapsed) => remaining_fraction(elapsed - cadence, grace),
    };

    Evaluation {
        state,
        cadence_progress,
        grace_progress,
    }
}

/// Seconds left in the cadence window; the full cadence while frozen.
pub fn seconds_remaining(habit: &Habit, now_ms: i64) -> f64 {
    let cadence = habit.cadence_seconds as f64;
    if habit.is_frozen {
        return cadence.max(0.0);
    }
    match elapsed_seconds(habit, now_ms) {
        None => 0.0,
        Some(elapsed) => (cadence - elapsed).max(0.0),
    }
}

/// Whether a started, unprotected habit has lapsed past its grace window.
pub fn needs_auto_freeze(habit: &Habit, now_ms: i64) -> bool {
    if habit.is_frozen || !habit.has_started() {
        return false;
    }
    evaluate(habit, now_ms).state == DisplayState::StreakLost
}

fn elapsed_seconds(habit: &Habit, now_ms: i64) -> Option<f64> {
    habit
        .last_completed_at()
        .map(|last| now_ms.saturating_sub(last) as f64 / MS_PER_SECOND as f64)
}

/// `1 - spent / window`, clamped to `[0, 1]`.
///
/// A non-positive window has no interior: it is full until spent, then empty.
fn remaining_fraction(spent: f64, window: f64) -> f64 {
    if window <= 0.0 {
        return if spent <= 0.0 { 1.0 } else { 0.0 };
    }
    clamp_unit(1.0 - spent / window)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
