//! Habit domain model.
//!
//! # Responsibility
//! - Define the canonical habit record and its completion ledger.
//! - Provide small state helpers used by lifecycle transitions.
//!
//! # Invariants
//! - `id` is stable and never reused for another habit.
//! - `cadence_seconds` and `grace_seconds` are strictly positive.
//! - `last_awarded_milestone` is a multiple of 5 and never exceeds the
//!   current run length.
//! - `completions` is sorted by `completed_at` ascending.

use crate::model::completion::Completion;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier shared by the canonical store and every projection.
pub type HabitId = Uuid;

/// Seconds in one hour.
pub const SECONDS_PER_HOUR: i64 = 3_600;

/// Grace window applied when the caller does not choose one.
pub const DEFAULT_GRACE_SECONDS: i64 = 24 * SECONDS_PER_HOUR;

/// Cadence choices offered to users when creating a habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadencePreset {
    Daily,
    EveryOtherDay,
    TwiceWeekly,
    Weekly,
}

impl CadencePreset {
    pub const ALL: [CadencePreset; 4] = [
        CadencePreset::Daily,
        CadencePreset::EveryOtherDay,
        CadencePreset::TwiceWeekly,
        CadencePreset::Weekly,
    ];

    pub fn hours(self) -> i64 {
        match self {
            Self::Daily => 24,
            Self::EveryOtherDay => 48,
            // Roughly 3.5 days.
            Self::TwiceWeekly => 84,
            Self::Weekly => 168,
        }
    }

    pub fn seconds(self) -> i64 {
        self.hours() * SECONDS_PER_HOUR
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::EveryOtherDay => "Every 2 days",
            Self::TwiceWeekly => "Twice a week",
            Self::Weekly => "Weekly",
        }
    }

    /// Returns the preset whose cadence matches exactly, if any.
    pub fn from_seconds(seconds: i64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.seconds() == seconds)
    }
}

/// Validation failures for habit records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HabitValidationError {
    EmptyName,
    EmptyEmoji,
    NonPositiveCadence(i64),
    NonPositiveGrace(i64),
    MilestoneNotMultipleOfFive(u32),
    MilestoneAboveRunLength { milestone: u32, run_length: u32 },
    StreakOffsetOutOfRange { offset: u32, ledger_len: usize },
    FrozenWithoutTimestamp,
}

impl Display for HabitValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "habit name cannot be empty"),
            Self::EmptyEmoji => write!(f, "habit emoji cannot be empty"),
            Self::NonPositiveCadence(value) => {
                write!(f, "cadence must be positive, got {value}s")
            }
            Self::NonPositiveGrace(value) => write!(f, "grace must be positive, got {value}s"),
            Self::MilestoneNotMultipleOfFive(value) => {
                write!(f, "milestone {value} is not a multiple of 5")
            }
            Self::MilestoneAboveRunLength {
                milestone,
                run_length,
            } => write!(
                f,
                "milestone {milestone} exceeds current run length {run_length}"
            ),
            Self::StreakOffsetOutOfRange { offset, ledger_len } => write!(
                f,
                "streak offset {offset} is beyond ledger length {ledger_len}"
            ),
            Self::FrozenWithoutTimestamp => write!(f, "frozen habit is missing frozen_at"),
        }
    }
}

impl Error for HabitValidationError {}

/// Canonical habit record with its completion ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    pub emoji: String,
    /// Length of the on-track window after a completion.
    pub cadence_seconds: i64,
    /// Length of the at-risk window that follows the cadence window.
    pub grace_seconds: i64,
    /// Explicit protection; overrides time-based derivation until the next
    /// completion.
    pub is_frozen: bool,
    /// Unix epoch milliseconds. Set iff `is_frozen`.
    pub frozen_at: Option<i64>,
    pub last_awarded_milestone: u32,
    /// Ledger index where the current run starts. Stays 0 unless history is
    /// kept across broken streaks.
    pub streak_offset: u32,
    pub sort_order: i64,
    pub is_archived: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub completions: Vec<Completion>,
}

impl Habit {
    /// Creates a habit with a generated id and an empty ledger.
    pub fn new(
        name: impl Into<String>,
        emoji: impl Into<String>,
        cadence_seconds: i64,
        grace_seconds: i64,
        created_at: i64,
    ) -> Self {
        Self::with_id(
            Uuid::new_v4(),
            name,
            emoji,
            cadence_seconds,
            grace_seconds,
            created_at,
        )
    }

    /// Creates a habit with a caller-provided id.
    ///
    /// Used by import paths and tests that need deterministic identity.
    pub fn with_id(
        id: HabitId,
        name: impl Into<String>,
        emoji: impl Into<String>,
        cadence_seconds: i64,
        grace_seconds: i64,
        created_at: i64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            emoji: emoji.into(),
            cadence_seconds,
            grace_seconds,
            is_frozen: false,
            frozen_at: None,
            last_awarded_milestone: 0,
            streak_offset: 0,
            sort_order: 0,
            is_archived: false,
            created_at,
            completions: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), HabitValidationError> {
        if self.name.trim().is_empty() {
            return Err(HabitValidationError::EmptyName);
        }
        if self.emoji.trim().is_empty() {
            return Err(HabitValidationError::EmptyEmoji);
        }
        if self.cadence_seconds <= 0 {
            return Err(HabitValidationError::NonPositiveCadence(
                self.cadence_seconds,
            ));
        }
        if self.grace_seconds <= 0 {
            return Err(HabitValidationError::NonPositiveGrace(self.grace_seconds));
        }
        if self.is_frozen && self.frozen_at.is_none() {
            return Err(HabitValidationError::FrozenWithoutTimestamp);
        }
        if self.streak_offset as usize > self.completions.len() {
            return Err(HabitValidationError::StreakOffsetOutOfRange {
                offset: self.streak_offset,
                ledger_len: self.completions.len(),
            });
        }
        if self.last_awarded_milestone % 5 != 0 {
            return Err(HabitValidationError::MilestoneNotMultipleOfFive(
                self.last_awarded_milestone,
            ));
        }
        if self.last_awarded_milestone > self.run_length() {
            return Err(HabitValidationError::MilestoneAboveRunLength {
                milestone: self.last_awarded_milestone,
                run_length: self.run_length(),
            });
        }
        Ok(())
    }

    /// Latest completion timestamp in the ledger.
    pub fn last_completed_at(&self) -> Option<i64> {
        self.completions.last().map(|completion| completion.completed_at)
    }

    /// Completions counted toward the current run, ignoring lapse state.
    pub fn run_length(&self) -> u32 {
        let total = self.completions.len();
        let offset = (self.streak_offset as usize).min(total);
        u32::try_from(total - offset).unwrap_or(u32::MAX)
    }

    /// All completions held in the ledger.
    pub fn total_completions(&self) -> usize {
        self.completions.len()
    }

    pub fn has_started(&self) -> bool {
        !self.completions.is_empty()
    }

    /// Inserts a completion keeping the ledger ordered by time.
    ///
    /// Equal timestamps keep insertion order.
    pub fn push_completion(&mut self, completion: Completion) {
        let index = self
            .completions
            .partition_point(|existing| existing.completed_at <= completion.completed_at);
        self.completions.insert(index, completion);
    }

    pub fn set_frozen(&mut self, at: i64) {
        self.is_frozen = true;
        self.frozen_at = Some(at);
    }

    pub fn clear_freeze(&mut self) {
        self.is_frozen = false;
        self.frozen_at = None;
    }

    pub fn archive(&mut self) {
        self.is_archived = true;
    }

    pub fn restore(&mut self) {
        self.is_archived = false;
    }
}

#[cfg(test)]
mod tests {
    use super::{CadencePreset, Habit, HabitValidationError, DEFAULT_GRACE_SECONDS};
    use crate::model::completion::Completion;

    fn daily() -> Habit {
        Habit::new(
            "Read",
            "📚",
            CadencePreset::Daily.seconds(),
            DEFAULT_GRACE_SECONDS,
            0,
        )
    }

    #[test]
    fn push_completion_keeps_ledger_sorted() {
        let mut habit = daily();
        habit.push_completion(Completion::new(300));
        habit.push_completion(Completion::new(100));
        habit.push_completion(Completion::new(200));

        let times: Vec<i64> = habit.completions.iter().map(|c| c.completed_at).collect();
        assert_eq!(times, vec![100, 200, 300]);
        assert_eq!(habit.last_completed_at(), Some(300));
    }

    #[test]
    fn validate_rejects_non_positive_windows() {
        let mut habit = daily();
        habit.cadence_seconds = 0;
        assert_eq!(
            habit.validate(),
            Err(HabitValidationError::NonPositiveCadence(0))
        );

        let mut habit = daily();
        habit.grace_seconds = -5;
        assert_eq!(
            habit.validate(),
            Err(HabitValidationError::NonPositiveGrace(-5))
        );
    }

    #[test]
    fn validate_rejects_milestone_above_run_length() {
        let mut habit = daily();
        habit.last_awarded_milestone = 5;
        assert!(matches!(
            habit.validate(),
            Err(HabitValidationError::MilestoneAboveRunLength { .. })
        ));
    }

    #[test]
    fn run_length_respects_streak_offset() {
        let mut habit = daily();
        for at in 0..4 {
            habit.push_completion(Completion::new(at));
        }
        habit.streak_offset = 3;
        assert_eq!(habit.run_length(), 1);
        assert_eq!(habit.total_completions(), 4);
    }

    #[test]
    fn presets_map_back_from_seconds() {
        assert_eq!(
            CadencePreset::from_seconds(84 * 3_600),
            Some(CadencePreset::TwiceWeekly)
        );
        assert_eq!(CadencePreset::from_seconds(5), None);
    }
}
