//! Canonical-store habit commands.

use super::{parse_id, print_json, CliResult, Context};
use clap::ValueEnum;
use habit_core::{CadencePreset, CompleteOutcome, HabitId, HabitView, NewHabit};
use serde_json::json;

const SECONDS_PER_HOUR: i64 = 3_600;

#[derive(Clone, Copy, ValueEnum)]
pub enum PresetArg {
    Daily,
    EveryOtherDay,
    TwiceWeekly,
    Weekly,
}

impl From<PresetArg> for CadencePreset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::Daily => Self::Daily,
            PresetArg::EveryOtherDay => Self::EveryOtherDay,
            PresetArg::TwiceWeekly => Self::TwiceWeekly,
            PresetArg::Weekly => Self::Weekly,
        }
    }
}

pub fn add(
    ctx: &Context,
    name: String,
    emoji: String,
    preset: PresetArg,
    cadence_hours: Option<i64>,
    grace_hours: Option<i64>,
) -> CliResult<()> {
    let cadence_seconds = match cadence_hours {
        Some(hours) => hours_to_seconds(hours)?,
        None => CadencePreset::from(preset).seconds(),
    };
    let grace_seconds = grace_hours.map(hours_to_seconds).transpose()?;
    let request = NewHabit {
        name,
        emoji,
        cadence_seconds,
        grace_seconds,
    };
    let now = ctx.now_ms(None);
    let habit = ctx.with_service(|service| Ok(service.create_habit(&request, now)?))?;
    print_json(&serde_json::to_value(&habit)?)
}

pub fn list(ctx: &Context, include_archived: bool) -> CliResult<()> {
    let now = ctx.now_ms(None);
    let views = ctx.with_service(|service| {
        if include_archived {
            let habits = service.list_habits(true)?;
            Ok(habits
                .iter()
                .map(|habit| HabitView::build(habit, now))
                .collect::<Vec<_>>())
        } else {
            Ok(service.list_views(now)?)
        }
    })?;
    print_json(&serde_json::to_value(&views)?)
}

pub fn show(ctx: &Context, raw_id: &str) -> CliResult<()> {
    let id = parse_id(raw_id)?;
    let now = ctx.now_ms(None);
    let view = ctx.with_service(|service| Ok(service.evaluate(id, now)?))?;
    print_json(&serde_json::to_value(&view)?)
}

pub fn complete(ctx: &Context, raw_id: &str, at: Option<i64>, notes: Option<String>) -> CliResult<()> {
    let id = parse_id(raw_id)?;
    let at = ctx.now_ms(at);
    let outcome = ctx.with_service(|service| {
        Ok(match notes {
            Some(notes) => service.complete_with_notes(id, at, notes)?,
            None => service.complete(id, at)?,
        })
    })?;
    print_json(&outcome_json(id, at, &outcome))
}

pub fn freeze(ctx: &Context, raw_id: &str, at: Option<i64>) -> CliResult<()> {
    let id = parse_id(raw_id)?;
    let at = ctx.now_ms(at);
    let balance = ctx.with_service(|service| {
        service.freeze(id, at)?;
        Ok(service.freeze_balance()?)
    })?;
    print_json(&json!({ "habit_id": id, "frozen_at": at, "freeze_balance": balance }))
}

pub fn auto_freeze(ctx: &Context) -> CliResult<()> {
    let now = ctx.now_ms(None);
    let (frozen, balance) = ctx.with_service(|service| {
        let frozen = service.auto_freeze_lapsed(now)?;
        Ok((frozen, service.freeze_balance()?))
    })?;
    print_json(&json!({ "frozen": frozen, "freeze_balance": balance }))
}

pub fn archive(ctx: &Context, raw_id: &str) -> CliResult<()> {
    let id = parse_id(raw_id)?;
    ctx.with_service(|service| Ok(service.archive_habit(id)?))?;
    print_json(&json!({ "habit_id": id, "archived": true }))
}

pub fn restore(ctx: &Context, raw_id: &str) -> CliResult<()> {
    let id = parse_id(raw_id)?;
    ctx.with_service(|service| Ok(service.restore_habit(id)?))?;
    print_json(&json!({ "habit_id": id, "archived": false }))
}

pub fn delete(ctx: &Context, raw_id: &str) -> CliResult<()> {
    let id = parse_id(raw_id)?;
    ctx.with_service(|service| Ok(service.delete_habit(id)?))?;
    print_json(&json!({ "habit_id": id, "deleted": true }))
}

pub fn summary(ctx: &Context) -> CliResult<()> {
    let now = ctx.now_ms(None);
    let (summary, balance) = ctx.with_service(|service| {
        let summary = service.summary(now)?;
        Ok((summary, service.freeze_balance()?))
    })?;
    let mut value = serde_json::to_value(&summary)?;
    value["freeze_balance"] = json!(balance);
    print_json(&value)
}

fn hours_to_seconds(hours: i64) -> CliResult<i64> {
    hours
        .checked_mul(SECONDS_PER_HOUR)
        .ok_or_else(|| format!("duration of {hours}h is out of range").into())
}

fn outcome_json(id: HabitId, at: i64, outcome: &CompleteOutcome) -> serde_json::Value {
    json!({
        "habit_id": id,
        "completed_at": at,
        "unfroze": outcome.unfroze,
        "streak_reset": outcome.streak_reset,
        "milestone_granted": outcome.milestone_granted,
    })
}
