//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose app-side and widget-side habit operations to Dart via FRB.
//! - Resolve storage locations once per process from `configure`.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Failures are reported in envelopes (`ok = false` + `message`).
//! - Widget functions only touch the shared store, never the habit DB.

use habit_core::db::open_db;
use habit_core::sync::{ProjectionRecord, ProjectionWriter, SharedStore, SyncMediator};
use habit_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    CadencePreset, Clock, CoreConfig, HabitId, HabitService, HabitView, LogLevel, NewHabit,
    SqliteHabitRepository, SystemClock,
};
use log::warn;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const DATA_DIR_ENV: &str = "HABIT_DATA_DIR";
const DEFAULT_DATA_DIR_NAME: &str = "habit_tracker";
static CORE_CONFIG: OnceLock<CoreConfig> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    let result = level
        .parse::<LogLevel>()
        .and_then(|level| init_logging_inner(level, Path::new(log_dir.trim())));
    match result {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Fixes the data directory for this process.
///
/// Reads `config.toml` from `data_dir` when present. Repeating the call with
/// the same directory is a no-op; a different directory is rejected.
#[flutter_rust_bridge::frb(sync)]
pub fn configure(data_dir: String) -> String {
    let data_dir = PathBuf::from(data_dir.trim());
    if data_dir.as_os_str().is_empty() {
        return "data_dir cannot be empty".to_string();
    }
    if let Some(active) = CORE_CONFIG.get() {
        return if active.data_dir == data_dir {
            String::new()
        } else {
            format!(
                "already configured at `{}`; refusing to switch to `{}`",
                active.data_dir.display(),
                data_dir.display()
            )
        };
    }

    let mut config = match CoreConfig::load(data_dir.join(habit_core::config::CONFIG_FILE_NAME)) {
        Ok(config) => config,
        Err(err) => return format!("configure failed: {err}"),
    };
    config.data_dir = data_dir;
    if let Err(err) = std::fs::create_dir_all(&config.data_dir) {
        return format!("configure failed: {err}");
    }
    match CORE_CONFIG.set(config) {
        Ok(()) => String::new(),
        // Lost a race with another caller; report against the winner.
        Err(config) => configure(config.data_dir.to_string_lossy().into_owned()),
    }
}

/// Result envelope for single-habit mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitActionResponse {
    pub ok: bool,
    /// Target or created habit id.
    pub habit_id: Option<String>,
    /// Milestone granted by a completion, if any.
    pub milestone: Option<u32>,
    pub message: String,
}

impl HabitActionResponse {
    fn success(message: impl Into<String>, habit_id: HabitId, milestone: Option<u32>) -> Self {
        Self {
            ok: true,
            habit_id: Some(habit_id.to_string()),
            milestone,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            habit_id: None,
            milestone: None,
            message: message.into(),
        }
    }
}

/// One habit row as rendered by the app.
#[derive(Debug, Clone, PartialEq)]
pub struct HabitItem {
    pub habit_id: String,
    pub name: String,
    pub emoji: String,
    /// `onTrack|gracePeriod|frozen|streakLost|neverStarted`.
    pub state: String,
    pub progress: f64,
    pub cadence_progress: f64,
    pub grace_progress: f64,
    pub current_streak: u32,
    pub total_completions: u32,
    pub seconds_remaining: f64,
    pub last_completed_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HabitListResponse {
    pub ok: bool,
    pub items: Vec<HabitItem>,
    pub freeze_balance: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResponse {
    pub ok: bool,
    pub applied: u32,
    pub already_applied: u32,
    pub dropped: u32,
    pub published: u32,
    pub generation: u64,
    pub message: String,
}

/// One widget tile.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetItem {
    pub habit_id: String,
    pub name: String,
    pub emoji: String,
    pub streak: u32,
    pub progress: f64,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSnapshotResponse {
    pub ok: bool,
    pub items: Vec<WidgetItem>,
    pub is_placeholder: bool,
    /// Epoch ms of the next scheduled widget render.
    pub next_refresh_at: Option<i64>,
    pub message: String,
}

/// Creates a habit. `cadence_seconds` usually comes from
/// `app_cadence_presets`; `grace_seconds` falls back to the configured default.
#[flutter_rust_bridge::frb(sync)]
pub fn app_create_habit(
    name: String,
    emoji: String,
    cadence_seconds: i64,
    grace_seconds: Option<i64>,
) -> HabitActionResponse {
    let request = NewHabit {
        name,
        emoji,
        cadence_seconds,
        grace_seconds,
    };
    let now = SystemClock.now_ms();
    match with_habit_service(|service| service.create_habit(&request, now).map(|habit| habit.id)) {
        Ok(id) => HabitActionResponse::success("Habit created.", id, None),
        Err(err) => failure("app_create_habit", err),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CadencePresetItem {
    pub cadence_seconds: i64,
    pub display_name: String,
}

#[flutter_rust_bridge::frb(sync)]
pub fn app_cadence_presets() -> Vec<CadencePresetItem> {
    CadencePreset::ALL
        .iter()
        .map(|preset| CadencePresetItem {
            cadence_seconds: preset.seconds(),
            display_name: preset.display_name().to_string(),
        })
        .collect()
}

/// Completes a habit at `at_ms`, or now when absent.
#[flutter_rust_bridge::frb(sync)]
pub fn app_complete_habit(habit_id: String, at_ms: Option<i64>) -> HabitActionResponse {
    let at = at_ms.unwrap_or_else(|| SystemClock.now_ms());
    let result = parse_habit_id(&habit_id).and_then(|id| {
        with_habit_service(|service| service.complete(id, at).map(|outcome| (id, outcome)))
    });
    match result {
        Ok((id, outcome)) => {
            HabitActionResponse::success("Habit completed.", id, outcome.milestone_granted)
        }
        Err(err) => failure("app_complete_habit", err),
    }
}

/// Freezes a habit at `at_ms`, or now when absent.
#[flutter_rust_bridge::frb(sync)]
pub fn app_freeze_habit(habit_id: String, at_ms: Option<i64>) -> HabitActionResponse {
    let at = at_ms.unwrap_or_else(|| SystemClock.now_ms());
    let result = parse_habit_id(&habit_id)
        .and_then(|id| with_habit_service(|service| service.freeze(id, at).map(|()| id)));
    match result {
        Ok(id) => HabitActionResponse::success("Habit frozen.", id, None),
        Err(err) => failure("app_freeze_habit", err),
    }
}

/// Lists visible habits evaluated at `now_ms`, or now when absent.
#[flutter_rust_bridge::frb(sync)]
pub fn app_list_habits(now_ms: Option<i64>) -> HabitListResponse {
    let now = now_ms.unwrap_or_else(|| SystemClock.now_ms());
    let result = with_habit_service(|service| {
        let views = service.list_views(now)?;
        service.freeze_balance().map(|balance| (views, balance))
    });
    match result {
        Ok((views, freeze_balance)) => HabitListResponse {
            ok: true,
            message: format!("{} habit(s).", views.len()),
            items: views.iter().map(to_habit_item).collect(),
            freeze_balance,
        },
        Err(err) => {
            let failed = failure("app_list_habits", err);
            HabitListResponse {
                ok: false,
                items: Vec::new(),
                freeze_balance: 0,
                message: failed.message,
            }
        }
    }
}

/// Merges widget completions, then republishes the projection.
#[flutter_rust_bridge::frb(sync)]
pub fn app_sync(now_ms: Option<i64>) -> SyncResponse {
    let now = now_ms.unwrap_or_else(|| SystemClock.now_ms());
    let config = resolve_config();
    let result = SharedStore::open(config.shared_store_path())
        .map_err(|err| format!("shared store open failed: {err}"))
        .and_then(|store| {
            with_habit_service(|service| SyncMediator::new(service, &store).sync(now))
        });
    match result {
        Ok(report) => SyncResponse {
            ok: true,
            applied: count(report.merge.applied),
            already_applied: count(report.merge.already_applied),
            dropped: count(report.merge.dropped),
            published: count(report.published),
            generation: report.generation,
            message: "Sync complete.".to_string(),
        },
        Err(err) => SyncResponse {
            ok: false,
            applied: 0,
            already_applied: 0,
            dropped: 0,
            published: 0,
            generation: 0,
            message: failure("app_sync", err).message,
        },
    }
}

/// Loads widget tiles from the shared store.
#[flutter_rust_bridge::frb(sync)]
pub fn widget_load_habits(now_ms: Option<i64>) -> WidgetSnapshotResponse {
    let now = now_ms.unwrap_or_else(|| SystemClock.now_ms());
    let result = open_writer().and_then(|mut writer| {
        let snapshot = writer.load_habits(now).map_err(|err| err.to_string())?;
        Ok((snapshot, writer.next_refresh_at()))
    });
    match result {
        Ok((snapshot, next_refresh_at)) => WidgetSnapshotResponse {
            ok: true,
            items: snapshot.records.iter().map(to_widget_item).collect(),
            is_placeholder: snapshot.is_placeholder,
            next_refresh_at,
            message: String::new(),
        },
        Err(err) => WidgetSnapshotResponse {
            ok: false,
            items: Vec::new(),
            is_placeholder: false,
            next_refresh_at: None,
            message: failure("widget_load_habits", err).message,
        },
    }
}

/// Records a widget-side completion for the next app sync.
#[flutter_rust_bridge::frb(sync)]
pub fn widget_complete_habit(habit_id: String, now_ms: Option<i64>) -> HabitActionResponse {
    let now = now_ms.unwrap_or_else(|| SystemClock.now_ms());
    let result = parse_habit_id(&habit_id).and_then(|id| {
        let writer = open_writer()?;
        let queued = writer.complete(id, now).map_err(|err| err.to_string())?;
        Ok((id, queued))
    });
    match result {
        Ok((id, true)) => HabitActionResponse::success("Completion queued.", id, None),
        Ok((_, false)) => HabitActionResponse::failure("habit is not on the widget"),
        Err(err) => failure("widget_complete_habit", err),
    }
}

fn resolve_config() -> &'static CoreConfig {
    CORE_CONFIG.get_or_init(|| {
        let data_dir = std::env::var(DATA_DIR_ENV)
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DATA_DIR_NAME));
        ensure_data_dir(&data_dir);
        CoreConfig::with_data_dir(data_dir)
    })
}

/// Creates the fallback data directory. A failure is logged and the call
/// continues; the store open that follows reports the error to the caller.
fn ensure_data_dir(data_dir: &Path) -> bool {
    match std::fs::create_dir_all(data_dir) {
        Ok(()) => true,
        Err(err) => {
            warn!(
                "event=ffi_call module=ffi status=error op=resolve_config error_code=data_dir_create_failed path={} error={err}",
                data_dir.display()
            );
            false
        }
    }
}

fn with_habit_service<T, E: Display>(
    f: impl FnOnce(&HabitService<SqliteHabitRepository<'_>>) -> Result<T, E>,
) -> Result<T, String> {
    let config = resolve_config();
    let conn = open_db(config.db_path()).map_err(|err| format!("habit DB open failed: {err}"))?;
    let repo = SqliteHabitRepository::try_new(&conn)
        .map_err(|err| format!("habit repo init failed: {err}"))?;
    let service = HabitService::new(repo)
        .with_policy(config.streak_reset_policy)
        .with_default_grace_seconds(config.default_grace_seconds);
    f(&service).map_err(|err| err.to_string())
}

fn open_writer() -> Result<ProjectionWriter, String> {
    let config = resolve_config();
    let store = SharedStore::open(config.shared_store_path())
        .map_err(|err| format!("shared store open failed: {err}"))?;
    Ok(ProjectionWriter::with_policy(store, config.refresh_policy()))
}

fn parse_habit_id(raw: &str) -> Result<HabitId, String> {
    raw.trim()
        .parse::<HabitId>()
        .map_err(|_| format!("invalid habit id `{}`", raw.trim()))
}

fn failure(operation: &str, err: String) -> HabitActionResponse {
    warn!("event=ffi_call module=ffi status=error op={operation}");
    HabitActionResponse::failure(format!("{operation} failed: {err}"))
}

fn count(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn to_habit_item(view: &HabitView) -> HabitItem {
    HabitItem {
        habit_id: view.habit_id.to_string(),
        name: view.name.clone(),
        emoji: view.emoji.clone(),
        state: view.state.as_tag().to_string(),
        progress: view.ring_progress(),
        cadence_progress: view.cadence_progress,
        grace_progress: view.grace_progress,
        current_streak: view.current_streak,
        total_completions: count(view.total_completions),
        seconds_remaining: view.seconds_remaining,
        last_completed_at: view.last_completed_at,
    }
}

fn to_widget_item(record: &ProjectionRecord) -> WidgetItem {
    WidgetItem {
        habit_id: record.id.to_string(),
        name: record.name.clone(),
        emoji: record.emoji.clone(),
        streak: record.streak,
        progress: record.progress,
        state: record.display_state().as_tag().to_string(),
    }
}
