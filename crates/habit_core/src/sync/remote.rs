//! Widget-side actor.
//!
//! # Responsibility
//! - Render from the published projection, or from placeholders when none
//!   is readable.
//! - Record completions optimistically and queue them for the canonical
//!   merge.
//!
//! # Invariants
//! - Never touches canonical storage; the shared store is its only channel.
//! - A completion updates the projection and the queue in one transaction.

use crate::model::habit::HabitId;
use crate::sync::projection::{placeholder_records, ProjectionRecord};
use crate::sync::refresh::{RefreshPolicy, RefreshSignal, RenderMark};
use crate::sync::shared_store::{SharedStore, SharedStoreResult};
use log::{debug, info};
use serde::Serialize;

/// Widget-visible merge state of one habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteSyncState {
    Clean,
    PendingMerge,
}

/// What one widget render shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetSnapshot {
    pub records: Vec<ProjectionRecord>,
    pub is_placeholder: bool,
    pub generation: u64,
}

pub struct ProjectionWriter {
    store: SharedStore,
    policy: RefreshPolicy,
    last_render: Option<RenderMark>,
}

impl ProjectionWriter {
    pub fn new(store: SharedStore) -> Self {
        Self::with_policy(store, RefreshPolicy::default())
    }

    pub fn with_policy(store: SharedStore, policy: RefreshPolicy) -> Self {
        Self {
            store,
            policy,
            last_render: None,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Loads records for a render and remembers the render time.
    pub fn load_habits(&mut self, now_ms: i64) -> SharedStoreResult<WidgetSnapshot> {
        let signal = self.store.read_refresh()?;
        let (records, is_placeholder) = match self.store.read_projection()? {
            Some(records) => (records, false),
            None => (placeholder_records(), true),
        };
        self.last_render = Some(RenderMark {
            generation: signal.generation,
            rendered_at: now_ms,
        });
        debug!(
            "event=widget_load module=sync status=ok records={} placeholder={is_placeholder} generation={}",
            records.len(),
            signal.generation
        );
        Ok(WidgetSnapshot {
            records,
            is_placeholder,
            generation: signal.generation,
        })
    }

    /// Marks `habit_id` complete at `now_ms` and queues it for merge.
    ///
    /// Returns `false` without writing when the habit is not in the
    /// published projection.
    pub fn complete(&self, habit_id: HabitId, now_ms: i64) -> SharedStoreResult<bool> {
        let queued = self.store.transaction(|txn| {
            let Some(mut records) = txn.projection()? else {
                return Ok(false);
            };
            let Some(record) = records.iter_mut().find(|record| record.id == habit_id) else {
                return Ok(false);
            };
            record.apply_optimistic_completion(now_ms);
            txn.set_projection(&records, now_ms)?;

            let mut pending = txn.pending()?;
            pending.insert(habit_id, now_ms);
            txn.set_pending(&pending)?;
            txn.raise_refresh(now_ms)?;
            Ok(true)
        })?;
        if queued {
            info!("event=widget_complete module=sync status=ok habit_id={habit_id} completed_at={now_ms}");
        } else {
            info!("event=widget_complete module=sync status=skipped habit_id={habit_id} reason=unknown_habit");
        }
        Ok(queued)
    }

    pub fn sync_state(&self, habit_id: HabitId) -> SharedStoreResult<RemoteSyncState> {
        let pending = self.store.pending_snapshot()?;
        Ok(if pending.contains_key(&habit_id) {
            RemoteSyncState::PendingMerge
        } else {
            RemoteSyncState::Clean
        })
    }

    /// Whether the widget should re-render at `now_ms`.
    pub fn needs_refresh(&self, now_ms: i64) -> SharedStoreResult<bool> {
        let signal: RefreshSignal = self.store.read_refresh()?;
        Ok(self.policy.is_due(self.last_render.as_ref(), &signal, now_ms))
    }

    /// Time of the next scheduled render, if one has happened.
    pub fn next_refresh_at(&self) -> Option<i64> {
        self.last_render
            .as_ref()
            .map(|mark| self.policy.next_refresh_at(mark))
    }
}

#[cfg(test)]
mod tests {
    use super::{ProjectionWriter, RemoteSyncState};
    use crate::sync::projection::placeholder_records;
    use crate::sync::shared_store::SharedStore;
    use uuid::Uuid;

    #[test]
    fn missing_projection_loads_placeholders_and_ignores_completions() {
        let mut writer = ProjectionWriter::new(SharedStore::open_in_memory().unwrap());
        let snapshot = writer.load_habits(0).unwrap();
        assert!(snapshot.is_placeholder);
        assert_eq!(snapshot.records, placeholder_records());

        let id = snapshot.records[0].id;
        assert!(!writer.complete(id, 10).unwrap());
        assert!(writer.store().pending_snapshot().unwrap().is_empty());
    }

    #[test]
    fn complete_patches_record_and_queues_entry() {
        let store = SharedStore::open_in_memory().unwrap();
        let records = placeholder_records();
        let target = records[1].id;
        store.publish(&records, 0).unwrap();

        let mut writer = ProjectionWriter::new(store);
        let before = writer.load_habits(0).unwrap();
        assert!(!before.is_placeholder);
        assert!(!writer.needs_refresh(1_000).unwrap());

        assert!(writer.complete(target, 5_000).unwrap());
        assert_eq!(writer.sync_state(target).unwrap(), RemoteSyncState::PendingMerge);
        assert_eq!(writer.sync_state(Uuid::new_v4()).unwrap(), RemoteSyncState::Clean);
        assert!(writer.needs_refresh(5_000).unwrap());

        let after = writer.load_habits(5_000).unwrap();
        let patched = after.records.iter().find(|record| record.id == target).unwrap();
        assert_eq!(patched.streak, records[1].streak + 1);
        assert_eq!(patched.state, "onTrack");
        assert_eq!(patched.last_completed_at, Some(5_000));
        assert_eq!(writer.next_refresh_at(), Some(65_000));
    }
}
