pub mod habit;
pub mod widget;

use habit_core::db::open_db;
use habit_core::{
    init_logging, Clock, CoreConfig, HabitId, HabitService, SqliteHabitRepository, SystemClock,
};
use serde_json::Value;
use std::error::Error;
use std::path::PathBuf;

pub type CliResult<T> = Result<T, Box<dyn Error>>;

const DEFAULT_DATA_DIR: &str = "habit-data";

/// Resolved configuration shared by every subcommand.
pub struct Context {
    pub config: CoreConfig,
}

impl Context {
    /// Loads the config file and prepares the data directory.
    ///
    /// `--data-dir` wins over the file's `data_dir`.
    pub fn load(data_dir: Option<PathBuf>, config_path: Option<PathBuf>) -> CliResult<Self> {
        let base = data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let config_path =
            config_path.unwrap_or_else(|| base.join(habit_core::config::CONFIG_FILE_NAME));
        let mut config = CoreConfig::load(&config_path)?;
        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }
        if config.data_dir.is_relative() {
            config.data_dir = std::env::current_dir()?.join(&config.data_dir);
        }
        std::fs::create_dir_all(&config.data_dir)?;

        // A CLI run still works when the log directory is unusable.
        if let Err(err) = init_logging(config.log_level, &config.log_dir()) {
            eprintln!("warning: logging disabled: {err}");
        }
        Ok(Self { config })
    }

    pub fn now_ms(&self, at: Option<i64>) -> i64 {
        at.unwrap_or_else(|| SystemClock.now_ms())
    }

    /// Opens the canonical store and runs `f` against a configured service.
    pub fn with_service<T>(
        &self,
        f: impl FnOnce(&HabitService<SqliteHabitRepository<'_>>) -> CliResult<T>,
    ) -> CliResult<T> {
        let conn = open_db(self.config.db_path())?;
        let service = HabitService::new(SqliteHabitRepository::try_new(&conn)?)
            .with_policy(self.config.streak_reset_policy)
            .with_default_grace_seconds(self.config.default_grace_seconds);
        f(&service)
    }
}

pub fn parse_id(raw: &str) -> CliResult<HabitId> {
    HabitId::parse_str(raw.trim()).map_err(|err| format!("invalid habit id `{raw}`: {err}").into())
}

pub fn print_json(value: &Value) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
