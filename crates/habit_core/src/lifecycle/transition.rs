//! In-memory mutation rules for completions and freezes.
//!
//! Persistence wraps these in a single write transaction; they never touch
//! storage themselves.

use crate::lifecycle::evaluator::{evaluate, DisplayState};
use crate::lifecycle::streak::{check_milestone, StreakResetPolicy};
use crate::model::completion::Completion;
use crate::model::habit::Habit;

/// What a completion changed besides appending to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompleteOutcome {
    /// The habit was frozen and the completion lifted the freeze.
    pub unfroze: bool,
    /// The previous run had lapsed and was reset before recording.
    pub streak_reset: bool,
    /// Milestone reached by this completion, if it earned a reward.
    pub milestone_granted: Option<u32>,
}

/// Records `completion` on `habit`.
///
/// Order matters: the freeze is lifted first, so a lapsed run under a freeze
/// is still reset when evaluated at the completion time.
pub fn record_completion(
    habit: &mut Habit,
    completion: Completion,
    policy: StreakResetPolicy,
) -> CompleteOutcome {
    let mut outcome = CompleteOutcome::default();

    if habit.is_frozen {
        habit.clear_freeze();
        outcome.unfroze = true;
    }

    if evaluate(habit, completion.completed_at).state == DisplayState::StreakLost {
        policy.reset_run(habit);
        outcome.streak_reset = true;
    }

    habit.push_completion(completion);
    outcome.milestone_granted = check_milestone(habit);
    outcome
}

/// Protects `habit` until its next completion. Re-freezing moves `frozen_at`.
pub fn record_freeze(habit: &mut Habit, at: i64) {
    habit.set_frozen(at);
}
