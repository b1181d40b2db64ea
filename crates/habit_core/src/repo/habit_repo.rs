//! Habit repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over canonical `habits` + `completions` storage.
//! - Own the freeze wallet and merge receipts that live beside habits.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Habit::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - A habit and its ledger are written together or not at all.
//! - Ledgers are read back ordered by `completed_at ASC`.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::completion::Completion;
use crate::model::habit::{Habit, HabitId, HabitValidationError};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const HABIT_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    emoji,
    cadence_seconds,
    grace_seconds,
    is_frozen,
    frozen_at,
    last_awarded_milestone,
    streak_offset,
    sort_order,
    is_archived,
    created_at
FROM habits";

const REQUIRED_TABLES: &[&str] = &["habits", "completions", "freeze_wallet", "sync_receipts"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for habit persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(HabitValidationError),
    Db(DbError),
    NotFound(HabitId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "habit not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted habit data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it with open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HabitValidationError> for RepoError {
    fn from(value: HabitValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing habits.
#[derive(Debug, Clone, Default)]
pub struct HabitListQuery {
    pub include_archived: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for habit storage.
pub trait HabitRepository {
    fn create_habit(&self, habit: &Habit) -> RepoResult<HabitId>;
    /// Replaces the habit row and reconciles its ledger with `habit.completions`.
    fn update_habit(&self, habit: &Habit) -> RepoResult<()>;
    fn get_habit(&self, id: HabitId) -> RepoResult<Option<Habit>>;
    /// Lists habits ordered by `sort_order ASC, created_at ASC, uuid ASC`.
    fn list_habits(&self, query: &HabitListQuery) -> RepoResult<Vec<Habit>>;
    /// Hard-deletes a habit; its ledger and receipts cascade.
    fn delete_habit(&self, id: HabitId) -> RepoResult<()>;
    fn next_sort_order(&self) -> RepoResult<i64>;

    fn freeze_balance(&self) -> RepoResult<u32>;
    /// Adds `count` tokens and returns the new balance.
    fn credit_freezes(&self, count: u32) -> RepoResult<u32>;
    /// Takes one token; `false` when the wallet is empty.
    fn spend_freeze(&self) -> RepoResult<bool>;

    fn has_receipt(&self, id: HabitId, completed_at: i64) -> RepoResult<bool>;
    fn record_receipt(&self, id: HabitId, completed_at: i64, merged_at: i64) -> RepoResult<()>;
    /// Deletes the receipts for `entries`; returns how many existed.
    fn prune_receipts(&self, entries: &[(HabitId, i64)]) -> RepoResult<usize>;

    /// Runs `f` inside one exclusive write transaction.
    ///
    /// Concurrent writers (threads or processes) are serialized; nothing in
    /// `f` is visible to them until it returns `Ok`.
    fn write_transaction<T, F>(&self, f: F) -> RepoResult<T>
    where
        F: FnOnce(&Self) -> RepoResult<T>,
        Self: Sized;
}

/// SQLite-backed habit repository.
pub struct SqliteHabitRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHabitRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version is not current.
    /// - `MissingRequiredTable` when a required table is absent.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let actual_version = current_version(conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        for table in REQUIRED_TABLES {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }
}

impl HabitRepository for SqliteHabitRepository<'_> {
    fn create_habit(&self, habit: &Habit) -> RepoResult<HabitId> {
        habit.validate()?;

        with_savepoint(self.conn, "habit_create", || {
            self.conn.execute(
                "INSERT INTO habits (
                    uuid,
                    name,
                    emoji,
                    cadence_seconds,
                    grace_seconds,
                    is_frozen,
                    frozen_at,
                    last_awarded_milestone,
                    streak_offset,
                    sort_order,
                    is_archived,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
                params![
                    habit.id.to_string(),
                    habit.name.as_str(),
                    habit.emoji.as_str(),
                    habit.cadence_seconds,
                    habit.grace_seconds,
                    bool_to_int(habit.is_frozen),
                    habit.frozen_at,
                    habit.last_awarded_milestone,
                    habit.streak_offset,
                    habit.sort_order,
                    bool_to_int(habit.is_archived),
                    habit.created_at,
                ],
            )?;
            for completion in &habit.completions {
                insert_completion(self.conn, habit.id, completion)?;
            }
            Ok(())
        })?;

        Ok(habit.id)
    }

    fn update_habit(&self, habit: &Habit) -> RepoResult<()> {
        habit.validate()?;

        with_savepoint(self.conn, "habit_update", || {
            let changed = self.conn.execute(
                "UPDATE habits
                 SET
                    name = ?1,
                    emoji = ?2,
                    cadence_seconds = ?3,
                    grace_seconds = ?4,
                    is_frozen = ?5,
                    frozen_at = ?6,
                    last_awarded_milestone = ?7,
                    streak_offset = ?8,
                    sort_order = ?9,
                    is_archived = ?10,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?11;",
                params![
                    habit.name.as_str(),
                    habit.emoji.as_str(),
                    habit.cadence_seconds,
                    habit.grace_seconds,
                    bool_to_int(habit.is_frozen),
                    habit.frozen_at,
                    habit.last_awarded_milestone,
                    habit.streak_offset,
                    habit.sort_order,
                    bool_to_int(habit.is_archived),
                    habit.id.to_string(),
                ],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound(habit.id));
            }
            reconcile_ledger(self.conn, habit)
        })
    }

    fn get_habit(&self, id: HabitId) -> RepoResult<Option<Habit>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{HABIT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => {
                let mut habit = parse_habit_row(row)?;
                habit.completions = load_completions(self.conn, habit.id)?;
                habit.validate()?;
                Ok(Some(habit))
            }
            None => Ok(None),
        }
    }

    fn list_habits(&self, query: &HabitListQuery) -> RepoResult<Vec<Habit>> {
        let mut sql = format!("{HABIT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_archived {
            sql.push_str(" AND is_archived = 0");
        }

        sql.push_str(" ORDER BY sort_order ASC, created_at ASC, uuid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut habits = Vec::new();
        while let Some(row) = rows.next()? {
            habits.push(parse_habit_row(row)?);
        }

        for habit in &mut habits {
            habit.completions = load_completions(self.conn, habit.id)?;
            habit.validate()?;
        }
        Ok(habits)
    }

    fn delete_habit(&self, id: HabitId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM habits WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn next_sort_order(&self) -> RepoResult<i64> {
        let next = self.conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM habits;",
            [],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(next)
    }

    fn freeze_balance(&self) -> RepoResult<u32> {
        let balance = self.conn.query_row(
            "SELECT balance FROM freeze_wallet WHERE id = 1;",
            [],
            |row| row.get::<_, i64>(0),
        )?;
        u32::try_from(balance)
            .map_err(|_| RepoError::InvalidData(format!("invalid freeze balance `{balance}`")))
    }

    fn credit_freezes(&self, count: u32) -> RepoResult<u32> {
        self.conn.execute(
            "UPDATE freeze_wallet
             SET
                balance = balance + ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = 1;",
            [i64::from(count)],
        )?;
        self.freeze_balance()
    }

    fn spend_freeze(&self) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE freeze_wallet
             SET
                balance = balance - 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = 1 AND balance > 0;",
            [],
        )?;
        Ok(changed == 1)
    }

    fn has_receipt(&self, id: HabitId, completed_at: i64) -> RepoResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sync_receipts WHERE habit_uuid = ?1 AND completed_at = ?2
            );",
            params![id.to_string(), completed_at],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(exists == 1)
    }

    fn record_receipt(&self, id: HabitId, completed_at: i64, merged_at: i64) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO sync_receipts (habit_uuid, completed_at, merged_at)
             VALUES (?1, ?2, ?3);",
            params![id.to_string(), completed_at, merged_at],
        )?;
        Ok(())
    }

    fn prune_receipts(&self, entries: &[(HabitId, i64)]) -> RepoResult<usize> {
        let mut stmt = self.conn.prepare_cached(
            "DELETE FROM sync_receipts WHERE habit_uuid = ?1 AND completed_at = ?2;",
        )?;
        let mut removed = 0;
        for (id, completed_at) in entries {
            removed += stmt.execute(params![id.to_string(), completed_at])?;
        }
        Ok(removed)
    }

    fn write_transaction<T, F>(&self, f: F) -> RepoResult<T>
    where
        F: FnOnce(&Self) -> RepoResult<T>,
    {
        // Dropping `tx` without commit rolls back.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }
}

/// Runs `f` under a named savepoint so multi-statement writes stay atomic
/// whether or not an outer transaction is open.
fn with_savepoint<T>(
    conn: &Connection,
    name: &str,
    f: impl FnOnce() -> RepoResult<T>,
) -> RepoResult<T> {
    conn.execute_batch(&format!("SAVEPOINT {name};"))?;
    match f() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name};"))?;
            Ok(value)
        }
        Err(err) => {
            conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name};"))?;
            Err(err)
        }
    }
}

fn reconcile_ledger(conn: &Connection, habit: &Habit) -> RepoResult<()> {
    let habit_uuid = habit.id.to_string();

    if habit.completions.is_empty() {
        conn.execute(
            "DELETE FROM completions WHERE habit_uuid = ?1;",
            [habit_uuid.as_str()],
        )?;
        return Ok(());
    }

    let mut stmt = conn.prepare("SELECT uuid FROM completions WHERE habit_uuid = ?1;")?;
    let stored = stmt
        .query_map([habit_uuid.as_str()], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    let current = habit
        .completions
        .iter()
        .map(|completion| completion.id.to_string())
        .collect::<HashSet<_>>();

    for stale in stored.difference(&current) {
        conn.execute("DELETE FROM completions WHERE uuid = ?1;", [stale.as_str()])?;
    }
    for completion in &habit.completions {
        if !stored.contains(&completion.id.to_string()) {
            insert_completion(conn, habit.id, completion)?;
        }
    }
    Ok(())
}

fn insert_completion(conn: &Connection, habit_id: HabitId, completion: &Completion) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO completions (uuid, habit_uuid, completed_at, notes)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            completion.id.to_string(),
            habit_id.to_string(),
            completion.completed_at,
            completion.notes.as_deref(),
        ],
    )?;
    Ok(())
}

fn load_completions(conn: &Connection, habit_id: HabitId) -> RepoResult<Vec<Completion>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, completed_at, notes
         FROM completions
         WHERE habit_uuid = ?1
         ORDER BY completed_at ASC, rowid ASC;",
    )?;
    let mut rows = stmt.query([habit_id.to_string()])?;
    let mut completions = Vec::new();
    while let Some(row) = rows.next()? {
        completions.push(Completion {
            id: parse_uuid(row, "uuid", "completions.uuid")?,
            completed_at: row.get("completed_at")?,
            notes: row.get("notes")?,
        });
    }
    Ok(completions)
}

fn parse_habit_row(row: &Row<'_>) -> RepoResult<Habit> {
    Ok(Habit {
        id: parse_uuid(row, "uuid", "habits.uuid")?,
        name: row.get("name")?,
        emoji: row.get("emoji")?,
        cadence_seconds: row.get("cadence_seconds")?,
        grace_seconds: row.get("grace_seconds")?,
        is_frozen: parse_flag(row, "is_frozen")?,
        frozen_at: row.get("frozen_at")?,
        last_awarded_milestone: parse_counter(row, "last_awarded_milestone")?,
        streak_offset: parse_counter(row, "streak_offset")?,
        sort_order: row.get("sort_order")?,
        is_archived: parse_flag(row, "is_archived")?,
        created_at: row.get("created_at")?,
        completions: Vec::new(),
    })
}

fn parse_uuid(row: &Row<'_>, column: &str, label: &str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{text}` in {label}")))
}

fn parse_flag(row: &Row<'_>, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid {column} value `{other}` in habits.{column}"
        ))),
    }
}

fn parse_counter(row: &Row<'_>, column: &str) -> RepoResult<u32> {
    let value: i64 = row.get(column)?;
    u32::try_from(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid {column} value `{value}` in habits.{column}"))
    })
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        [table],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(exists == 1)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
