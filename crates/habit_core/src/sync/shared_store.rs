//! Process-external key/value store shared by the app and its widget.
//!
//! # Responsibility
//! - Hold the published projection, the pending-completion queue and the
//!   refresh signal in one embedded SQLite file both processes can open.
//! - Offer exclusive read-modify-write transactions over those values.
//!
//! # Invariants
//! - Every write happens inside a `BEGIN IMMEDIATE` transaction, so the
//!   two writers never interleave a read-modify-write.
//! - Unreadable values decode as absent; they never fail a read.
//! - A file SQLite cannot read at all is moved aside to `<name>.corrupt`
//!   and recreated empty.
//! - The queue is drained with read-then-clear: a reader snapshots it and
//!   later removes only the entries it merged, matching both id and
//!   timestamp, so a newer write for the same habit survives.

use crate::model::habit::HabitId;
use crate::sync::projection::ProjectionRecord;
use crate::sync::refresh::RefreshSignal;
use log::warn;
use rusqlite::types::Value;
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

const KEY_PROJECTION: &str = "projection";
const KEY_PENDING: &str = "pending_completions";
const KEY_REFRESH: &str = "refresh_signal";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const QUARANTINE_SUFFIX: &str = ".corrupt";
const SIDECAR_SUFFIXES: [&str; 2] = ["-wal", "-shm"];

/// Habit id to epoch-ms time of the remote completion awaiting merge.
///
/// One slot per habit: a second remote completion before a merge replaces
/// the first.
pub type PendingQueue = BTreeMap<HabitId, i64>;

pub type SharedStoreResult<T> = Result<T, SharedStoreError>;

#[derive(Debug)]
pub enum SharedStoreError {
    Sqlite(rusqlite::Error),
    Encode(serde_json::Error),
    /// Moving an unreadable store file aside failed.
    Io(std::io::Error),
}

impl Display for SharedStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "shared store: {err}"),
            Self::Encode(err) => write!(f, "shared store encode failed: {err}"),
            Self::Io(err) => write!(f, "shared store file: {err}"),
        }
    }
}

impl Error for SharedStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for SharedStoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<std::io::Error> for SharedStoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for SharedStoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Handle on the shared key/value file. Each process opens its own.
pub struct SharedStore {
    conn: Connection,
}

impl SharedStore {
    /// Opens or creates the store at `path`.
    ///
    /// A file that is not a readable SQLite database is renamed to
    /// `<name>.corrupt` and an empty store is created in its place.
    pub fn open(path: impl AsRef<Path>) -> SharedStoreResult<Self> {
        let path = path.as_ref();
        match Self::bootstrap(Connection::open(path)?) {
            Err(SharedStoreError::Sqlite(err)) if is_unreadable_file(&err) => {
                let moved_to = quarantine(path)?;
                warn!(
                    "event=shared_store_open module=sync status=error error_code=unreadable_file action=recreate moved_to={}",
                    moved_to.display()
                );
                Self::bootstrap(Connection::open(path)?)
            }
            other => other,
        }
    }

    pub fn open_in_memory() -> SharedStoreResult<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> SharedStoreResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS shared_kv (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    /// Runs `f` inside one exclusive transaction; commits only on `Ok`.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&SharedTxn<'_>) -> SharedStoreResult<T>,
    ) -> SharedStoreResult<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let value = f(&SharedTxn { conn: &tx })?;
        tx.commit()?;
        Ok(value)
    }

    /// Published projection, or `None` when missing or unreadable.
    pub fn read_projection(&self) -> SharedStoreResult<Option<Vec<ProjectionRecord>>> {
        SharedTxn { conn: &self.conn }.projection()
    }

    /// Snapshot of the pending queue; empty when missing or unreadable.
    pub fn pending_snapshot(&self) -> SharedStoreResult<PendingQueue> {
        SharedTxn { conn: &self.conn }.pending()
    }

    pub fn read_refresh(&self) -> SharedStoreResult<RefreshSignal> {
        SharedTxn { conn: &self.conn }.refresh()
    }

    /// Replaces the projection and raises the refresh signal atomically.
    pub fn publish(
        &self,
        records: &[ProjectionRecord],
        now_ms: i64,
    ) -> SharedStoreResult<RefreshSignal> {
        self.transaction(|txn| {
            txn.set_projection(records, now_ms)?;
            txn.raise_refresh(now_ms)
        })
    }

    /// Removes merged entries whose timestamp still matches the queue.
    ///
    /// Returns how many entries were removed.
    pub fn clear_merged(&self, merged: &[(HabitId, i64)]) -> SharedStoreResult<usize> {
        if merged.is_empty() {
            return Ok(0);
        }
        self.transaction(|txn| {
            let mut pending = txn.pending()?;
            let mut removed = 0;
            for (habit_id, completed_at) in merged {
                if pending.get(habit_id) == Some(completed_at) {
                    pending.remove(habit_id);
                    removed += 1;
                }
            }
            if removed > 0 {
                txn.set_pending(&pending)?;
            }
            Ok(removed)
        })
    }

    pub fn raise_refresh(&self, now_ms: i64) -> SharedStoreResult<RefreshSignal> {
        self.transaction(|txn| txn.raise_refresh(now_ms))
    }
}

/// Typed view over the key/value table inside one transaction.
pub struct SharedTxn<'t> {
    conn: &'t Connection,
}

impl SharedTxn<'_> {
    pub fn projection(&self) -> SharedStoreResult<Option<Vec<ProjectionRecord>>> {
        read_value(self.conn, KEY_PROJECTION)
    }

    pub fn set_projection(&self, records: &[ProjectionRecord], now_ms: i64) -> SharedStoreResult<()> {
        write_value(self.conn, KEY_PROJECTION, &records, now_ms)
    }

    pub fn pending(&self) -> SharedStoreResult<PendingQueue> {
        Ok(read_value(self.conn, KEY_PENDING)?.unwrap_or_default())
    }

    pub fn set_pending(&self, pending: &PendingQueue) -> SharedStoreResult<()> {
        // The queue's own timestamps carry the meaning; updated_at is 0.
        write_value(self.conn, KEY_PENDING, pending, 0)
    }

    pub fn refresh(&self) -> SharedStoreResult<RefreshSignal> {
        Ok(read_value(self.conn, KEY_REFRESH)?.unwrap_or_default())
    }

    /// Bumps the refresh generation and returns the new signal.
    pub fn raise_refresh(&self, now_ms: i64) -> SharedStoreResult<RefreshSignal> {
        let signal = self.refresh()?.next(now_ms);
        write_value(self.conn, KEY_REFRESH, &signal, now_ms)?;
        Ok(signal)
    }
}

fn is_unreadable_file(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
    )
}

/// Renames the store file to `<name>.corrupt` and discards its sidecars.
fn quarantine(path: &Path) -> SharedStoreResult<PathBuf> {
    let mut moved_to = path.as_os_str().to_owned();
    moved_to.push(QUARANTINE_SUFFIX);
    let moved_to = PathBuf::from(moved_to);
    remove_if_present(&moved_to)?;
    std::fs::rename(path, &moved_to)?;
    for suffix in SIDECAR_SUFFIXES {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(suffix);
        remove_if_present(Path::new(&sidecar))?;
    }
    Ok(moved_to)
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

fn read_value<T: DeserializeOwned>(conn: &Connection, key: &str) -> SharedStoreResult<Option<T>> {
    let stored: Option<Value> = conn
        .query_row(
            "SELECT value FROM shared_kv WHERE key = ?1;",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    let raw = match stored {
        None => return Ok(None),
        Some(Value::Blob(bytes)) => bytes,
        Some(Value::Text(text)) => text.into_bytes(),
        Some(_) => {
            warn!("event=shared_store_read module=sync status=error key={key} error_code=unexpected_type");
            return Ok(None);
        }
    };
    match serde_json::from_slice(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            warn!(
                "event=shared_store_read module=sync status=error key={key} bytes={} error_code=decode_failed error={err}",
                raw.len()
            );
            Ok(None)
        }
    }
}

fn write_value<T: Serialize + ?Sized>(
    conn: &Connection,
    key: &str,
    value: &T,
    now_ms: i64,
) -> SharedStoreResult<()> {
    let encoded = serde_json::to_vec(value)?;
    conn.execute(
        "INSERT INTO shared_kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at;",
        params![key, encoded, now_ms],
    )?;
    Ok(())
}
