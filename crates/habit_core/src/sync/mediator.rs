//! Canonical-side sync actor.
//!
//! # Responsibility
//! - Drain the pending-completion queue into canonical storage.
//! - Publish a fresh projection from canonical state and signal a refresh.
//!
//! # Invariants
//! - Each queued entry is applied at most once; merge receipts make a
//!   replay after a crash report `AlreadyApplied`.
//! - Merged completions keep their original remote timestamp.
//! - An entry is removed from the queue only after it settled, and only if
//!   the widget has not written a newer one for the same habit.

use crate::model::habit::HabitId;
use crate::repo::habit_repo::HabitRepository;
use crate::service::habit_service::{HabitService, MergeDisposition, ServiceError};
use crate::sync::projection::ProjectionRecord;
use crate::sync::refresh::RefreshSignal;
use crate::sync::shared_store::{SharedStore, SharedStoreError};
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug)]
pub enum SyncError {
    Store(SharedStoreError),
    Service(ServiceError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Service(err) => Some(err),
        }
    }
}

impl From<SharedStoreError> for SyncError {
    fn from(value: SharedStoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ServiceError> for SyncError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub applied: usize,
    pub already_applied: usize,
    pub dropped: usize,
    pub milestones_granted: usize,
    /// Queue entries removed after settling.
    pub cleared: usize,
    /// Merge receipts deleted once their entries left the queue.
    pub receipts_pruned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub merge: MergeReport,
    pub published: usize,
    pub generation: u64,
}

pub struct SyncMediator<'a, R: HabitRepository> {
    service: &'a HabitService<R>,
    store: &'a SharedStore,
}

impl<'a, R: HabitRepository> SyncMediator<'a, R> {
    pub fn new(service: &'a HabitService<R>, store: &'a SharedStore) -> Self {
        Self { service, store }
    }

    /// Merges every queued remote completion into canonical storage.
    pub fn merge_pending(&self, now_ms: i64) -> SyncResult<MergeReport> {
        let pending = self.store.pending_snapshot()?;
        let mut report = MergeReport::default();
        let mut settled: Vec<(HabitId, i64)> = Vec::with_capacity(pending.len());

        for (&habit_id, &completed_at) in &pending {
            let disposition = match self
                .service
                .merge_remote_completion(habit_id, completed_at, now_ms)
            {
                Ok(disposition) => disposition,
                Err(ServiceError::Validation(err)) => {
                    warn!(
                        "event=sync_merge module=sync status=dropped habit_id={habit_id} completed_at={completed_at} error={err}"
                    );
                    MergeDisposition::Dropped
                }
                Err(err) => {
                    // Keep what already settled; the failed entry stays queued.
                    self.settle(&settled, &mut report)?;
                    warn!(
                        "event=sync_merge module=sync status=error habit_id={habit_id} completed_at={completed_at} error={err}"
                    );
                    return Err(err.into());
                }
            };

            match disposition {
                MergeDisposition::Applied(outcome) => {
                    report.applied += 1;
                    if outcome.milestone_granted.is_some() {
                        report.milestones_granted += 1;
                    }
                }
                MergeDisposition::AlreadyApplied => report.already_applied += 1,
                MergeDisposition::Dropped => {
                    report.dropped += 1;
                    info!(
                        "event=sync_merge module=sync status=dropped habit_id={habit_id} completed_at={completed_at} reason=habit_unavailable"
                    );
                }
            }
            settled.push((habit_id, completed_at));
        }

        self.settle(&settled, &mut report)?;
        info!(
            "event=sync_merge module=sync status=ok applied={} already_applied={} dropped={} cleared={} receipts_pruned={}",
            report.applied,
            report.already_applied,
            report.dropped,
            report.cleared,
            report.receipts_pruned
        );
        Ok(report)
    }

    /// Clears settled entries from the queue, then forgets their receipts.
    ///
    /// After the clear no settled `(habit, timestamp)` pair is still queued:
    /// it was removed, or a newer write replaced it. Its receipt can no
    /// longer match a replay. A crash before the prune only leaves receipts
    /// behind.
    fn settle(&self, settled: &[(HabitId, i64)], report: &mut MergeReport) -> SyncResult<()> {
        report.cleared = self.store.clear_merged(settled)?;
        report.receipts_pruned = self.service.forget_merge_receipts(settled)?;
        Ok(())
    }

    /// Regenerates the projection for all non-archived habits and raises
    /// the refresh signal. Returns the record count and new signal.
    pub fn publish(&self, now_ms: i64) -> SyncResult<(usize, RefreshSignal)> {
        let records: Vec<ProjectionRecord> = self
            .service
            .list_views(now_ms)?
            .iter()
            .map(ProjectionRecord::from_view)
            .collect();
        let signal = self.store.publish(&records, now_ms)?;
        info!(
            "event=sync_publish module=sync status=ok records={} generation={}",
            records.len(),
            signal.generation
        );
        Ok((records.len(), signal))
    }

    /// Merge, then publish.
    pub fn sync(&self, now_ms: i64) -> SyncResult<SyncReport> {
        let merge = self.merge_pending(now_ms)?;
        let (published, signal) = self.publish(now_ms)?;
        Ok(SyncReport {
            merge,
            published,
            generation: signal.generation,
        })
    }
}
