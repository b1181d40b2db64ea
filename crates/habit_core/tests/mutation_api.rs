use habit_core::db::{open_db, open_db_in_memory};
use habit_core::{
    CadencePreset, DisplayState, Habit, HabitService, NewHabit, ServiceError,
    SqliteHabitRepository, StreakResetPolicy,
};
use rusqlite::Connection;
use std::thread;
use uuid::Uuid;

const DAY_MS: i64 = 86_400_000;

fn daily(service: &HabitService<SqliteHabitRepository<'_>>, name: &str) -> Habit {
    service
        .create_habit(&NewHabit::from_preset(name, "⭐", CadencePreset::Daily), 0)
        .unwrap()
}

fn service(conn: &Connection) -> HabitService<SqliteHabitRepository<'_>> {
    HabitService::new(SqliteHabitRepository::try_new(conn).unwrap())
}

#[test]
fn unknown_id_is_not_found_for_every_mutation() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let missing = Uuid::new_v4();

    assert!(matches!(service.complete(missing, 0), Err(ServiceError::NotFound(id)) if id == missing));
    assert!(matches!(service.freeze(missing, 0), Err(ServiceError::NotFound(id)) if id == missing));
    assert!(matches!(service.evaluate(missing, 0), Err(ServiceError::NotFound(id)) if id == missing));
    assert!(matches!(service.archive_habit(missing), Err(ServiceError::NotFound(_))));
    assert!(matches!(service.delete_habit(missing), Err(ServiceError::NotFound(_))));
}

#[test]
fn freeze_is_sticky_and_rewrites_timestamp() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let habit = daily(&service, "Journal");
    service.complete(habit.id, DAY_MS).unwrap();

    service.freeze(habit.id, 2 * DAY_MS).unwrap();
    service.freeze(habit.id, 3 * DAY_MS).unwrap();

    let stored = service.get_habit(habit.id).unwrap().unwrap();
    assert_eq!(stored.frozen_at, Some(3 * DAY_MS));
    assert_eq!(stored.total_completions(), 1);
    assert_eq!(stored.last_awarded_milestone, 0);

    let view = service.evaluate(habit.id, 30 * DAY_MS).unwrap();
    assert_eq!(view.state, DisplayState::Frozen);
    assert_eq!(view.cadence_progress, 1.0);
    assert_eq!(view.current_streak, 1);
    assert_eq!(view.seconds_remaining, 86_400.0);
}

#[test]
fn completion_after_freeze_lifts_it() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let habit = daily(&service, "Stretch");
    service.complete(habit.id, DAY_MS).unwrap();
    service.freeze(habit.id, DAY_MS + 1).unwrap();

    let outcome = service.complete(habit.id, DAY_MS + 2).unwrap();
    assert!(outcome.unfroze);
    assert!(!outcome.streak_reset);

    let stored = service.get_habit(habit.id).unwrap().unwrap();
    assert!(!stored.is_frozen);
    assert_eq!(stored.frozen_at, None);
    assert_eq!(
        service.evaluate(habit.id, DAY_MS + 2).unwrap().state,
        DisplayState::OnTrack
    );
}

#[test]
fn milestones_credit_the_freeze_wallet() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let habit = daily(&service, "Code");

    for day in 1..=10 {
        service.complete(habit.id, day * DAY_MS).unwrap();
    }
    assert_eq!(service.freeze_balance().unwrap(), 2);
    assert_eq!(
        service.get_habit(habit.id).unwrap().unwrap().last_awarded_milestone,
        10
    );
}

#[test]
fn lapsed_completion_wipes_ledger_by_default() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let habit = daily(&service, "Run");
    for day in 0..12 {
        service.complete(habit.id, day * DAY_MS).unwrap();
    }

    let now = 16 * DAY_MS;
    let outcome = service.complete(habit.id, now).unwrap();
    assert!(outcome.streak_reset);

    let view = service.evaluate(habit.id, now).unwrap();
    assert_eq!(view.total_completions, 1);
    assert_eq!(view.current_streak, 1);
    assert_eq!(
        service.get_habit(habit.id).unwrap().unwrap().last_awarded_milestone,
        0
    );
}

#[test]
fn keep_history_policy_preserves_totals() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn).with_policy(StreakResetPolicy::KeepHistory);
    let habit = daily(&service, "Run");
    for day in 0..12 {
        service.complete(habit.id, day * DAY_MS).unwrap();
    }

    let now = 16 * DAY_MS;
    service.complete(habit.id, now).unwrap();

    let view = service.evaluate(habit.id, now).unwrap();
    assert_eq!(view.total_completions, 13);
    assert_eq!(view.current_streak, 1);

    // Persisted offset survives a reload and milestones count the new run.
    for day in 17..21 {
        service.complete(habit.id, day * DAY_MS).unwrap();
    }
    let stored = service.get_habit(habit.id).unwrap().unwrap();
    assert_eq!(stored.run_length(), 5);
    assert_eq!(stored.last_awarded_milestone, 5);
}

#[test]
fn auto_freeze_spends_tokens_in_display_order() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let earner = daily(&service, "Earner");
    let first = daily(&service, "First");
    let second = daily(&service, "Second");
    let fresh = daily(&service, "Fresh");

    for day in 1..=5 {
        service.complete(earner.id, day * DAY_MS).unwrap();
    }
    service.complete(first.id, DAY_MS).unwrap();
    service.complete(second.id, DAY_MS).unwrap();
    assert_eq!(service.freeze_balance().unwrap(), 1);

    // Earner completed on day 5 is still in grace on day 6.5; the other two lapsed.
    let now = 6 * DAY_MS + DAY_MS / 2;
    let frozen = service.auto_freeze_lapsed(now).unwrap();
    assert_eq!(frozen, vec![first.id]);
    assert_eq!(service.freeze_balance().unwrap(), 0);

    assert_eq!(service.evaluate(first.id, now).unwrap().state, DisplayState::Frozen);
    assert_eq!(
        service.evaluate(second.id, now).unwrap().state,
        DisplayState::StreakLost
    );
    assert_eq!(
        service.evaluate(fresh.id, now).unwrap().state,
        DisplayState::NeverStarted
    );
    assert!(service.auto_freeze_lapsed(now).unwrap().is_empty());
}

#[test]
fn summary_covers_visible_habits() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let read = daily(&service, "Read");
    let hidden = daily(&service, "Hidden");
    daily(&service, "Fresh");
    for day in 1..=3 {
        service.complete(read.id, day * DAY_MS).unwrap();
        service.complete(hidden.id, day * DAY_MS).unwrap();
    }
    service.archive_habit(hidden.id).unwrap();

    let summary = service.summary(3 * DAY_MS).unwrap();
    assert_eq!(summary.habit_count, 2);
    assert_eq!(summary.total_completions, 3);
    assert_eq!(summary.best_streak, 3);
    assert_eq!(summary.on_track, 1);
    assert_eq!(summary.never_started, 1);
}

#[test]
fn concurrent_completions_on_one_habit_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habits.sqlite3");
    let habit_id = {
        let conn = open_db(&path).unwrap();
        daily(&service(&conn), "Water").id
    };

    let workers: Vec<_> = (0..4i64)
        .map(|worker| {
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = service(&conn);
                for step in 0..10i64 {
                    service
                        .complete(habit_id, DAY_MS + worker * 1_000 + step * 10)
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let conn = open_db(&path).unwrap();
    let service = service(&conn);
    let stored = service.get_habit(habit_id).unwrap().unwrap();
    assert_eq!(stored.total_completions(), 40);
    assert_eq!(stored.last_awarded_milestone, 40);
    assert_eq!(service.freeze_balance().unwrap(), 8);
}
