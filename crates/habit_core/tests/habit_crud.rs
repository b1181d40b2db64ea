use habit_core::db::open_db_in_memory;
use habit_core::{
    CadencePreset, Completion, Habit, HabitDetails, HabitListQuery, HabitRepository,
    HabitService, HabitValidationError, NewHabit, RepoError, ServiceError, SqliteHabitRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

const DAY_MS: i64 = 86_400_000;

#[test]
fn create_and_get_round_trips_ledger_in_time_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();

    let mut habit = Habit::new("Read", "📚", 86_400, 86_400, 0);
    habit.push_completion(Completion::with_notes(3 * DAY_MS, "chapter 3"));
    habit.push_completion(Completion::new(DAY_MS));
    habit.push_completion(Completion::new(2 * DAY_MS));
    repo.create_habit(&habit).unwrap();

    let loaded = repo.get_habit(habit.id).unwrap().unwrap();
    assert_eq!(loaded, habit);
    let times: Vec<i64> = loaded
        .completions
        .iter()
        .map(|completion| completion.completed_at)
        .collect();
    assert_eq!(times, vec![DAY_MS, 2 * DAY_MS, 3 * DAY_MS]);
    assert_eq!(loaded.completions[2].notes.as_deref(), Some("chapter 3"));
}

#[test]
fn invalid_habit_is_rejected_before_sql() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();

    let habit = Habit::new("   ", "📚", 86_400, 86_400, 0);
    let err = repo.create_habit(&habit).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(HabitValidationError::EmptyName)
    ));
    assert!(repo.get_habit(habit.id).unwrap().is_none());
}

#[test]
fn update_reconciles_wiped_ledger() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();

    let mut habit = Habit::new("Run", "🏃", 86_400, 86_400, 0);
    for day in 0..4 {
        habit.push_completion(Completion::new(day * DAY_MS));
    }
    repo.create_habit(&habit).unwrap();

    habit.completions.clear();
    habit.push_completion(Completion::new(10 * DAY_MS));
    repo.update_habit(&habit).unwrap();

    let loaded = repo.get_habit(habit.id).unwrap().unwrap();
    assert_eq!(loaded.total_completions(), 1);
    assert_eq!(loaded.last_completed_at(), Some(10 * DAY_MS));
    assert_eq!(count_rows(&conn, "completions"), 1);
}

#[test]
fn delete_cascades_to_ledger_and_receipts() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();

    let mut habit = Habit::new("Cook", "🍳", 86_400, 86_400, 0);
    habit.push_completion(Completion::new(DAY_MS));
    repo.create_habit(&habit).unwrap();
    repo.record_receipt(habit.id, DAY_MS, 2 * DAY_MS).unwrap();

    repo.delete_habit(habit.id).unwrap();
    assert_eq!(count_rows(&conn, "completions"), 0);
    assert_eq!(count_rows(&conn, "sync_receipts"), 0);
    assert!(matches!(
        repo.delete_habit(habit.id),
        Err(RepoError::NotFound(id)) if id == habit.id
    ));
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteHabitRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn try_new_rejects_missing_table() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("DROP TABLE sync_receipts;").unwrap();
    let err = SqliteHabitRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::MissingRequiredTable("sync_receipts")
    ));
}

#[test]
fn list_orders_by_sort_order_and_hides_archived() {
    let conn = open_db_in_memory().unwrap();
    let service = HabitService::new(SqliteHabitRepository::try_new(&conn).unwrap());

    let read = service
        .create_habit(&NewHabit::from_preset("Read", "📚", CadencePreset::Daily), 0)
        .unwrap();
    let walk = service
        .create_habit(&NewHabit::from_preset("Walk", "🚶", CadencePreset::Weekly), 1)
        .unwrap();
    let floss = service
        .create_habit(&NewHabit::from_preset("Floss", "🦷", CadencePreset::Daily), 2)
        .unwrap();
    assert_eq!(
        (read.sort_order, walk.sort_order, floss.sort_order),
        (0, 1, 2)
    );

    service.reorder_habits(&[floss.id, read.id, walk.id]).unwrap();
    service.archive_habit(read.id).unwrap();

    let visible: Vec<Uuid> = service
        .list_habits(false)
        .unwrap()
        .iter()
        .map(|habit| habit.id)
        .collect();
    assert_eq!(visible, vec![floss.id, walk.id]);

    let all = service.list_habits(true).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[1].id, read.id);
    assert!(all[1].is_archived);

    service.restore_habit(read.id).unwrap();
    assert_eq!(service.list_habits(false).unwrap().len(), 3);
}

#[test]
fn reorder_with_unknown_id_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let service = HabitService::new(SqliteHabitRepository::try_new(&conn).unwrap());
    let first = service
        .create_habit(&NewHabit::from_preset("A", "🅰️", CadencePreset::Daily), 0)
        .unwrap();
    let second = service
        .create_habit(&NewHabit::from_preset("B", "🅱️", CadencePreset::Daily), 0)
        .unwrap();

    let missing = Uuid::new_v4();
    let err = service
        .reorder_habits(&[second.id, missing, first.id])
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(id) if id == missing));

    let habits = service.list_habits(false).unwrap();
    assert_eq!(habits[0].id, first.id);
    assert_eq!(habits[1].id, second.id);
}

#[test]
fn list_query_paginates() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();
    for index in 0..5 {
        let mut habit = Habit::new(format!("Habit {index}"), "⭐", 86_400, 86_400, index);
        habit.sort_order = index;
        repo.create_habit(&habit).unwrap();
    }

    let page = repo
        .list_habits(&HabitListQuery {
            include_archived: false,
            limit: Some(2),
            offset: 2,
        })
        .unwrap();
    let names: Vec<&str> = page.iter().map(|habit| habit.name.as_str()).collect();
    assert_eq!(names, vec!["Habit 2", "Habit 3"]);
}

#[test]
fn details_update_keeps_ledger_and_trims_input() {
    let conn = open_db_in_memory().unwrap();
    let service = HabitService::new(SqliteHabitRepository::try_new(&conn).unwrap());
    let habit = service
        .create_habit(&NewHabit::from_preset("Piano", "🎹", CadencePreset::Daily), 0)
        .unwrap();
    service.complete(habit.id, DAY_MS).unwrap();

    let updated = service
        .update_habit_details(
            habit.id,
            &HabitDetails {
                name: "  Piano practice ".to_string(),
                emoji: "🎹".to_string(),
                cadence_seconds: CadencePreset::EveryOtherDay.seconds(),
                grace_seconds: 3_600,
            },
        )
        .unwrap();
    assert_eq!(updated.name, "Piano practice");
    assert_eq!(updated.total_completions(), 1);

    let err = service
        .update_habit_details(
            habit.id,
            &HabitDetails {
                name: "Piano".to_string(),
                emoji: "🎹".to_string(),
                cadence_seconds: 0,
                grace_seconds: 3_600,
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(HabitValidationError::NonPositiveCadence(0))
    ));
}

#[test]
fn create_uses_default_grace_when_unspecified() {
    let conn = open_db_in_memory().unwrap();
    let service = HabitService::new(SqliteHabitRepository::try_new(&conn).unwrap())
        .with_default_grace_seconds(7_200);
    let habit = service
        .create_habit(&NewHabit::from_preset("Water", "💧", CadencePreset::Daily), 0)
        .unwrap();
    assert_eq!(habit.grace_seconds, 7_200);

    let explicit = service
        .create_habit(
            &NewHabit {
                name: "Stretch".to_string(),
                emoji: "🤸".to_string(),
                cadence_seconds: 3_600,
                grace_seconds: Some(600),
            },
            0,
        )
        .unwrap();
    assert_eq!(explicit.grace_seconds, 600);
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
