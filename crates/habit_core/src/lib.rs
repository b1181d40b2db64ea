//! Core domain logic for the habit tracker.
//! This crate is the single source of truth for streak and sync invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, CoreConfig};
pub use lifecycle::{evaluate, CompleteOutcome, DisplayState, Evaluation, StreakResetPolicy};
pub use logging::{init_logging, logging_status, LogLevel, LoggingError};
pub use model::completion::{Completion, CompletionId};
pub use model::habit::{CadencePreset, Habit, HabitId, HabitValidationError};
pub use repo::habit_repo::{
    HabitListQuery, HabitRepository, RepoError, RepoResult, SqliteHabitRepository,
};
pub use service::habit_service::{
    HabitDetails, HabitService, MergeDisposition, NewHabit, ServiceError, ServiceResult,
};
pub use service::read_model::{HabitSummary, HabitView};
pub use sync::{
    ProjectionRecord, ProjectionWriter, SharedStore, SharedStoreError, SyncError, SyncMediator,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
