//! Habit lifecycle state engine.
//!
//! # Responsibility
//! - Derive display state and progress fractions from a habit snapshot.
//! - Derive the current streak and decide milestone rewards.
//! - Apply completion/freeze transitions to an in-memory habit.
//!
//! # Invariants
//! - Evaluation is pure: no I/O, no clock reads, no mutation.
//! - Progress fractions are always inside `[0, 1]`.
//! - Transitions never reject a timestamp; skewed input is computed as-is.

pub mod evaluator;
pub mod streak;
pub mod transition;

pub use evaluator::{evaluate, needs_auto_freeze, seconds_remaining, DisplayState, Evaluation};
pub use streak::{check_milestone, current_streak, would_grant_at, StreakResetPolicy};
pub use transition::{record_completion, record_freeze, CompleteOutcome};
