//! Command-line front end over `habit_core`.
//!
//! # Responsibility
//! - Drive the canonical habit store and the widget-facing shared store
//!   from a terminal.
//! - Print results as JSON so scripts can consume them.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "habit", version, about = "Habit tracker CLI")]
struct Cli {
    /// Directory holding the databases and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Config file (default: <data-dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a habit
    Add {
        name: String,
        emoji: String,
        /// Cadence preset
        #[arg(long, value_enum, default_value = "daily", conflicts_with = "cadence_hours")]
        cadence: commands::habit::PresetArg,
        /// Custom cadence in hours
        #[arg(long)]
        cadence_hours: Option<i64>,
        /// Grace window in hours (default from config)
        #[arg(long)]
        grace_hours: Option<i64>,
    },
    /// List habits with their current state
    List {
        /// Include archived habits
        #[arg(long)]
        all: bool,
    },
    /// Show one habit
    Show { id: String },
    /// Record a completion
    Complete {
        id: String,
        /// Completion time in epoch milliseconds (default: now)
        #[arg(long)]
        at: Option<i64>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Freeze a habit's streak
    Freeze {
        id: String,
        #[arg(long)]
        at: Option<i64>,
    },
    /// Spend freeze tokens on lapsed habits
    AutoFreeze,
    /// Hide a habit from lists and the widget
    Archive { id: String },
    /// Bring an archived habit back
    Restore { id: String },
    /// Delete a habit and its history
    Delete { id: String },
    /// Aggregate counters and freeze balance
    Summary,
    /// Merge widget completions and republish the projection
    Sync {
        #[arg(long)]
        at: Option<i64>,
    },
    /// Widget-side operations against the shared store
    Widget {
        #[command(subcommand)]
        action: commands::widget::WidgetAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = commands::Context::load(cli.data_dir, cli.config).and_then(|ctx| {
        match cli.command {
            Commands::Add {
                name,
                emoji,
                cadence,
                cadence_hours,
                grace_hours,
            } => commands::habit::add(&ctx, name, emoji, cadence, cadence_hours, grace_hours),
            Commands::List { all } => commands::habit::list(&ctx, all),
            Commands::Show { id } => commands::habit::show(&ctx, &id),
            Commands::Complete { id, at, notes } => commands::habit::complete(&ctx, &id, at, notes),
            Commands::Freeze { id, at } => commands::habit::freeze(&ctx, &id, at),
            Commands::AutoFreeze => commands::habit::auto_freeze(&ctx),
            Commands::Archive { id } => commands::habit::archive(&ctx, &id),
            Commands::Restore { id } => commands::habit::restore(&ctx, &id),
            Commands::Delete { id } => commands::habit::delete(&ctx, &id),
            Commands::Summary => commands::habit::summary(&ctx),
            Commands::Sync { at } => commands::widget::sync(&ctx, at),
            Commands::Widget { action } => commands::widget::run(&ctx, action),
        }
    });

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
