//! Cross-surface sync between the app and the home-screen widget.
//!
//! # Responsibility
//! - `shared_store`: the only channel between the two processes.
//! - `remote`: widget-side optimistic completions and rendering.
//! - `mediator`: canonical-side merge and publish.
//!
//! # Invariants
//! - Canonical habit storage is written only by the mediator, through
//!   `HabitService`.
//! - The projection is rebuildable from canonical state at any time.

pub mod mediator;
pub mod projection;
pub mod refresh;
pub mod remote;
pub mod shared_store;

pub use mediator::{MergeReport, SyncError, SyncMediator, SyncReport, SyncResult};
pub use projection::{placeholder_records, ProjectionRecord};
pub use refresh::{RefreshPolicy, RefreshSignal, RenderMark, DEFAULT_REFRESH_INTERVAL_SECONDS};
pub use remote::{ProjectionWriter, RemoteSyncState, WidgetSnapshot};
pub use shared_store::{PendingQueue, SharedStore, SharedStoreError, SharedStoreResult};
