//! Completion ledger entry.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CompletionId = Uuid;

/// One recorded completion event.
///
/// The owning habit is implied by the ledger that holds the value; storage
/// keeps a non-owning `habit_uuid` reference only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub id: CompletionId,
    /// Unix epoch milliseconds of the event, not of when it was stored.
    pub completed_at: i64,
    pub notes: Option<String>,
}

impl Completion {
    pub fn new(completed_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            completed_at,
            notes: None,
        }
    }

    pub fn with_notes(completed_at: i64, notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::new(completed_at)
        }
    }
}
