//! Streak derivation and milestone rewards.
//!
//! A milestone is a run length that is a positive multiple of
//! [`MILESTONE_INTERVAL`]; crossing each one grants exactly one streak freeze.

use crate::lifecycle::evaluator::{evaluate, DisplayState};
use crate::model::habit::Habit;
use serde::{Deserialize, Serialize};

pub const MILESTONE_INTERVAL: u32 = 5;

/// What a completion on a broken streak does to existing history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakResetPolicy {
    /// Discard the whole ledger; lifetime totals restart from zero.
    #[default]
    WipeLedger,
    /// Keep the ledger and restart the run counter at the ledger end.
    KeepHistory,
}

impl StreakResetPolicy {
    /// Starts a fresh run on `habit` and resets the milestone tracker.
    pub fn reset_run(self, habit: &mut Habit) {
        match self {
            Self::WipeLedger => {
                habit.completions.clear();
                habit.streak_offset = 0;
            }
            Self::KeepHistory => {
                habit.streak_offset = u32::try_from(habit.completions.len()).unwrap_or(u32::MAX);
            }
        }
        habit.last_awarded_milestone = 0;
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WipeLedger => "wipe_ledger",
            Self::KeepHistory => "keep_history",
        }
    }
}

/// Streak shown to users: the run length, or 0 once the streak is lost.
pub fn current_streak(habit: &Habit, now_ms: i64) -> u32 {
    match evaluate(habit, now_ms).state {
        DisplayState::StreakLost | DisplayState::NeverStarted => 0,
        DisplayState::OnTrack | DisplayState::GracePeriod | DisplayState::Frozen => {
            habit.run_length()
        }
    }
}

/// Whether reaching run length `n` earns a reward given the last award.
pub fn would_grant_at(n: u32, last_awarded: u32) -> bool {
    n > 0 && n % MILESTONE_INTERVAL == 0 && n > last_awarded
}

/// Records a milestone reward if the raw run length has earned one.
///
/// Uses the run length regardless of lapse state. Returns the milestone that
/// was granted. Call once per completion event: a run that jumps past a
/// multiple of 5 in one step skips that milestone.
pub fn check_milestone(habit: &mut Habit) -> Option<u32> {
    let n = habit.run_length();
    if !would_grant_at(n, habit.last_awarded_milestone) {
        return None;
    }
    habit.last_awarded_milestone = n;
    Some(n)
}
