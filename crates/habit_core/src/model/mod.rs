//! Canonical habit domain model.
//!
//! # Responsibility
//! - Define the habit record and its exclusively owned completion ledger.
//! - Keep validation rules next to the data they protect.
//!
//! # Invariants
//! - Every habit is identified by a stable `HabitId`.
//! - A completion belongs to exactly one habit and dies with it.
//! - The ledger is always ordered by `completed_at` ascending.

pub mod completion;
pub mod habit;
