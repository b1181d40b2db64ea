//! Habit use-case service and mutation API.
//!
//! # Responsibility
//! - Provide the only entry points that change habit state (`complete`,
//!   `freeze`) plus habit management and read-model queries.
//! - Run every mutation as load, transition, write inside one exclusive
//!   repository transaction.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Two mutations of the same habit never interleave.
//! - A milestone grant and its wallet credit commit together.
//! - A remote completion with a merge receipt is never applied twice.

use crate::lifecycle::{
    needs_auto_freeze, record_completion, record_freeze, CompleteOutcome, StreakResetPolicy,
};
use crate::model::completion::Completion;
use crate::model::habit::{
    CadencePreset, Habit, HabitId, HabitValidationError, DEFAULT_GRACE_SECONDS,
};
use crate::repo::habit_repo::{HabitListQuery, HabitRepository, RepoError, RepoResult};
use crate::service::read_model::{HabitSummary, HabitView};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for habit use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Target habit id does not resolve.
    NotFound(HabitId),
    /// Input or resulting state violates habit invariants.
    Validation(HabitValidationError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "habit not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Request model for creating a habit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHabit {
    pub name: String,
    pub emoji: String,
    pub cadence_seconds: i64,
    /// Falls back to `DEFAULT_GRACE_SECONDS`.
    pub grace_seconds: Option<i64>,
}

impl NewHabit {
    pub fn from_preset(
        name: impl Into<String>,
        emoji: impl Into<String>,
        preset: CadencePreset,
    ) -> Self {
        Self {
            name: name.into(),
            emoji: emoji.into(),
            cadence_seconds: preset.seconds(),
            grace_seconds: None,
        }
    }
}

/// Editable habit fields; the ledger and lifecycle fields are not editable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitDetails {
    pub name: String,
    pub emoji: String,
    pub cadence_seconds: i64,
    pub grace_seconds: i64,
}

/// Result of merging one remote completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDisposition {
    Applied(CompleteOutcome),
    /// A receipt shows this entry was merged before.
    AlreadyApplied,
    /// The habit was deleted or archived.
    Dropped,
}

/// Use-case service over a habit repository.
pub struct HabitService<R: HabitRepository> {
    repo: R,
    policy: StreakResetPolicy,
    default_grace_seconds: i64,
}

impl<R: HabitRepository> HabitService<R> {
    /// Creates a service with the default ledger-wiping reset policy.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            policy: StreakResetPolicy::default(),
            default_grace_seconds: DEFAULT_GRACE_SECONDS,
        }
    }

    pub fn with_policy(mut self, policy: StreakResetPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_default_grace_seconds(mut self, grace_seconds: i64) -> Self {
        self.default_grace_seconds = grace_seconds;
        self
    }

    pub fn policy(&self) -> StreakResetPolicy {
        self.policy
    }

    /// Creates a habit at the end of the current ordering.
    pub fn create_habit(&self, request: &NewHabit, now_ms: i64) -> ServiceResult<Habit> {
        let mut habit = Habit::new(
            request.name.trim(),
            request.emoji.trim(),
            request.cadence_seconds,
            request.grace_seconds.unwrap_or(self.default_grace_seconds),
            now_ms,
        );
        let habit = self.repo.write_transaction(|repo| {
            habit.sort_order = repo.next_sort_order()?;
            repo.create_habit(&habit)?;
            Ok(habit)
        })?;
        info!(
            "event=habit_create module=service status=ok habit_id={} cadence_seconds={}",
            habit.id, habit.cadence_seconds
        );
        Ok(habit)
    }

    /// Replaces name, emoji and windows. Ledger and streak state are kept.
    pub fn update_habit_details(&self, id: HabitId, details: &HabitDetails) -> ServiceResult<Habit> {
        self.mutate_habit(id, |habit, _| {
            habit.name = details.name.trim().to_string();
            habit.emoji = details.emoji.trim().to_string();
            habit.cadence_seconds = details.cadence_seconds;
            habit.grace_seconds = details.grace_seconds;
            Ok(habit.clone())
        })
    }

    pub fn get_habit(&self, id: HabitId) -> ServiceResult<Option<Habit>> {
        Ok(self.repo.get_habit(id)?)
    }

    pub fn list_habits(&self, include_archived: bool) -> ServiceResult<Vec<Habit>> {
        let query = HabitListQuery {
            include_archived,
            ..HabitListQuery::default()
        };
        Ok(self.repo.list_habits(&query)?)
    }

    pub fn archive_habit(&self, id: HabitId) -> ServiceResult<()> {
        self.mutate_habit(id, |habit, _| {
            habit.archive();
            Ok(())
        })
    }

    pub fn restore_habit(&self, id: HabitId) -> ServiceResult<()> {
        self.mutate_habit(id, |habit, _| {
            habit.restore();
            Ok(())
        })
    }

    /// Assigns `sort_order` by position in `ordered_ids`.
    ///
    /// All-or-nothing: an unknown id rolls back every change.
    pub fn reorder_habits(&self, ordered_ids: &[HabitId]) -> ServiceResult<()> {
        self.repo.write_transaction(|repo| {
            for (position, id) in ordered_ids.iter().enumerate() {
                let mut habit = repo.get_habit(*id)?.ok_or(RepoError::NotFound(*id))?;
                habit.sort_order = i64::try_from(position).unwrap_or(i64::MAX);
                repo.update_habit(&habit)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Deletes a habit together with its ledger.
    pub fn delete_habit(&self, id: HabitId) -> ServiceResult<()> {
        self.repo.delete_habit(id)?;
        info!("event=habit_delete module=service status=ok habit_id={id}");
        Ok(())
    }

    /// Records a completion at `at_ms`.
    ///
    /// Lifts any freeze, resets a lapsed run per the configured policy,
    /// appends the completion, then checks for a milestone reward.
    pub fn complete(&self, id: HabitId, at_ms: i64) -> ServiceResult<CompleteOutcome> {
        self.complete_with(id, Completion::new(at_ms))
    }

    pub fn complete_with_notes(
        &self,
        id: HabitId,
        at_ms: i64,
        notes: impl Into<String>,
    ) -> ServiceResult<CompleteOutcome> {
        self.complete_with(id, Completion::with_notes(at_ms, notes))
    }

    /// Protects a habit until its next completion.
    pub fn freeze(&self, id: HabitId, at_ms: i64) -> ServiceResult<()> {
        let result = self.mutate_habit(id, |habit, _| {
            record_freeze(habit, at_ms);
            Ok(())
        });
        match &result {
            Ok(()) => info!("event=habit_freeze module=service status=ok habit_id={id}"),
            Err(err) => warn!("event=habit_freeze module=service status=error habit_id={id} error={err}"),
        }
        result
    }

    /// Read model for one habit.
    pub fn evaluate(&self, id: HabitId, now_ms: i64) -> ServiceResult<HabitView> {
        let habit = self.repo.get_habit(id)?.ok_or(ServiceError::NotFound(id))?;
        Ok(HabitView::build(&habit, now_ms))
    }

    /// Read model for every non-archived habit in display order.
    pub fn list_views(&self, now_ms: i64) -> ServiceResult<Vec<HabitView>> {
        Ok(self
            .list_habits(false)?
            .iter()
            .map(|habit| HabitView::build(habit, now_ms))
            .collect())
    }

    pub fn summary(&self, now_ms: i64) -> ServiceResult<HabitSummary> {
        Ok(HabitSummary::from_views(&self.list_views(now_ms)?))
    }

    /// Streak freezes earned and not yet spent.
    pub fn freeze_balance(&self) -> ServiceResult<u32> {
        Ok(self.repo.freeze_balance()?)
    }

    /// Spends one wallet token per lapsed, started, unfrozen habit.
    ///
    /// Habits are visited in display order; stops when the wallet is empty.
    /// Returns the habits that were frozen.
    pub fn auto_freeze_lapsed(&self, now_ms: i64) -> ServiceResult<Vec<HabitId>> {
        let frozen = self.repo.write_transaction(|repo| {
            let mut frozen = Vec::new();
            for mut habit in repo.list_habits(&HabitListQuery::default())? {
                if !needs_auto_freeze(&habit, now_ms) {
                    continue;
                }
                if !repo.spend_freeze()? {
                    break;
                }
                record_freeze(&mut habit, now_ms);
                repo.update_habit(&habit)?;
                frozen.push(habit.id);
            }
            Ok(frozen)
        })?;
        if !frozen.is_empty() {
            info!(
                "event=habit_auto_freeze module=service status=ok frozen_count={}",
                frozen.len()
            );
        }
        Ok(frozen)
    }

    /// Applies a completion that originated on a remote surface.
    ///
    /// Uses the original event time. The merge receipt is written in the
    /// same transaction as the completion, so replaying the same entry
    /// reports `AlreadyApplied` instead of completing twice.
    pub fn merge_remote_completion(
        &self,
        id: HabitId,
        completed_at: i64,
        merged_at: i64,
    ) -> ServiceResult<MergeDisposition> {
        let policy = self.policy;
        let disposition = self.repo.write_transaction(|repo| {
            let Some(mut habit) = repo.get_habit(id)?.filter(|habit| !habit.is_archived) else {
                return Ok(MergeDisposition::Dropped);
            };
            if repo.has_receipt(id, completed_at)? {
                return Ok(MergeDisposition::AlreadyApplied);
            }
            let outcome = apply_completion(repo, &mut habit, Completion::new(completed_at), policy)?;
            repo.update_habit(&habit)?;
            repo.record_receipt(id, completed_at, merged_at)?;
            Ok(MergeDisposition::Applied(outcome))
        })?;
        Ok(disposition)
    }

    /// Drops merge receipts whose queue entries are gone from the shared
    /// store. Returns how many receipts were removed.
    pub fn forget_merge_receipts(&self, entries: &[(HabitId, i64)]) -> ServiceResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        Ok(self
            .repo
            .write_transaction(|repo| repo.prune_receipts(entries))?)
    }

    fn complete_with(&self, id: HabitId, completion: Completion) -> ServiceResult<CompleteOutcome> {
        let policy = self.policy;
        let result = self.mutate_habit(id, |habit, repo| {
            apply_completion(repo, habit, completion, policy)
        });
        match &result {
            Ok(outcome) => info!(
                "event=habit_complete module=service status=ok habit_id={id} streak_reset={} milestone={}",
                outcome.streak_reset,
                outcome.milestone_granted.unwrap_or(0)
            ),
            Err(err) => warn!(
                "event=habit_complete module=service status=error habit_id={id} error={err}"
            ),
        }
        result
    }

    fn mutate_habit<T>(
        &self,
        id: HabitId,
        f: impl FnOnce(&mut Habit, &R) -> RepoResult<T>,
    ) -> ServiceResult<T> {
        let value = self.repo.write_transaction(|repo| {
            let mut habit = repo.get_habit(id)?.ok_or(RepoError::NotFound(id))?;
            let value = f(&mut habit, repo)?;
            repo.update_habit(&habit)?;
            Ok(value)
        })?;
        Ok(value)
    }
}

fn apply_completion<R: HabitRepository>(
    repo: &R,
    habit: &mut Habit,
    completion: Completion,
    policy: StreakResetPolicy,
) -> RepoResult<CompleteOutcome> {
    let outcome = record_completion(habit, completion, policy);
    if outcome.milestone_granted.is_some() {
        repo.credit_freezes(1)?;
    }
    Ok(outcome)
}
