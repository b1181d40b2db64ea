//! Derived read model rendered by presentation layers.

use crate::lifecycle::{current_streak, evaluate, seconds_remaining, DisplayState};
use crate::model::habit::{Habit, HabitId};
use serde::Serialize;

/// Snapshot of one habit as it should be displayed at a given instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HabitView {
    pub habit_id: HabitId,
    pub name: String,
    pub emoji: String,
    pub state: DisplayState,
    pub cadence_progress: f64,
    pub grace_progress: f64,
    pub current_streak: u32,
    pub total_completions: usize,
    pub seconds_remaining: f64,
    pub last_completed_at: Option<i64>,
    pub cadence_seconds: i64,
    pub grace_seconds: i64,
}

impl HabitView {
    pub fn build(habit: &Habit, now_ms: i64) -> Self {
        let evaluation = evaluate(habit, now_ms);
        Self {
            habit_id: habit.id,
            name: habit.name.clone(),
            emoji: habit.emoji.clone(),
            state: evaluation.state,
            cadence_progress: evaluation.cadence_progress,
            grace_progress: evaluation.grace_progress,
            current_streak: current_streak(habit, now_ms),
            total_completions: habit.total_completions(),
            seconds_remaining: seconds_remaining(habit, now_ms),
            last_completed_at: habit.last_completed_at(),
            cadence_seconds: habit.cadence_seconds,
            grace_seconds: habit.grace_seconds,
        }
    }

    /// Single ring fraction: grace progress while at risk, cadence progress
    /// otherwise.
    pub fn ring_progress(&self) -> f64 {
        match self.state {
            DisplayState::GracePeriod => self.grace_progress,
            _ => self.cadence_progress,
        }
    }
}

/// Aggregate counters across the visible habits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HabitSummary {
    pub habit_count: usize,
    pub total_completions: usize,
    pub best_streak: u32,
    pub on_track: usize,
    pub grace_period: usize,
    pub frozen: usize,
    pub streak_lost: usize,
    pub never_started: usize,
}

impl HabitSummary {
    pub fn from_views(views: &[HabitView]) -> Self {
        let mut summary = Self {
            habit_count: views.len(),
            ..Self::default()
        };
        for view in views {
            summary.total_completions += view.total_completions;
            summary.best_streak = summary.best_streak.max(view.current_streak);
            match view.state {
                DisplayState::OnTrack => summary.on_track += 1,
                DisplayState::GracePeriod => summary.grace_period += 1,
                DisplayState::Frozen => summary.frozen += 1,
                DisplayState::StreakLost => summary.streak_lost += 1,
                DisplayState::NeverStarted => summary.never_started += 1,
            }
        }
        summary
    }
}
