//! Shared-store commands: the app-side sync and a stand-in for the widget.

use super::{parse_id, print_json, CliResult, Context};
use clap::Subcommand;
use habit_core::sync::SharedStore;
use habit_core::{ProjectionWriter, SyncMediator};
use serde_json::json;

#[derive(Subcommand)]
pub enum WidgetAction {
    /// Render what the widget would show
    Show {
        #[arg(long)]
        at: Option<i64>,
    },
    /// Complete a habit from the widget
    Complete {
        id: String,
        #[arg(long)]
        at: Option<i64>,
    },
}

pub fn run(ctx: &Context, action: WidgetAction) -> CliResult<()> {
    let store = SharedStore::open(ctx.config.shared_store_path())?;
    let mut writer = ProjectionWriter::with_policy(store, ctx.config.refresh_policy());
    match action {
        WidgetAction::Show { at } => {
            let snapshot = writer.load_habits(ctx.now_ms(at))?;
            let mut value = serde_json::to_value(&snapshot)?;
            value["next_refresh_at"] = json!(writer.next_refresh_at());
            print_json(&value)
        }
        WidgetAction::Complete { id, at } => {
            let habit_id = parse_id(&id)?;
            let now = ctx.now_ms(at);
            if !writer.complete(habit_id, now)? {
                return Err(format!("habit {habit_id} is not in the published projection").into());
            }
            let state = writer.sync_state(habit_id)?;
            print_json(&json!({ "habit_id": habit_id, "completed_at": now, "sync_state": state }))
        }
    }
}

pub fn sync(ctx: &Context, at: Option<i64>) -> CliResult<()> {
    let store = SharedStore::open(ctx.config.shared_store_path())?;
    let now = ctx.now_ms(at);
    let report = ctx.with_service(|service| Ok(SyncMediator::new(service, &store).sync(now)?))?;
    print_json(&serde_json::to_value(report)?)
}
