use habit_core::lifecycle::{
    check_milestone, current_streak, evaluate, record_completion, record_freeze, would_grant_at,
    DisplayState, StreakResetPolicy,
};
use habit_core::{Completion, Habit};
use proptest::prelude::*;

const BASE_MS: i64 = 1_700_000_000_000;
const DAY: i64 = 86_400;
const DAY_MS: i64 = DAY * 1_000;

/// Habit whose last of `count` completions lands exactly at `BASE_MS`.
fn habit_completed(cadence_seconds: i64, grace_seconds: i64, count: usize) -> Habit {
    let mut habit = Habit::new("Meditate", "🧘", cadence_seconds, grace_seconds, 0);
    for index in 0..count {
        let back = i64::try_from(count - 1 - index).unwrap() * 1_000;
        habit.push_completion(Completion::new(BASE_MS - back));
    }
    habit
}

fn windows() -> impl Strategy<Value = (i64, i64)> {
    (1i64..=2_000_000, 1i64..=2_000_000)
}

proptest! {
    #[test]
    fn on_track_progress_is_bounded_and_strictly_decreasing(
        (cadence, grace) in windows(),
        count in 1usize..20,
        a in 0u32..=1_000_000,
        b in 0u32..=1_000_000,
    ) {
        let habit = habit_completed(cadence, grace, count);
        let span = cadence * 1_000;
        let early = i64::from(a.min(b)) * span / 1_000_000;
        let late = i64::from(a.max(b)) * span / 1_000_000;

        let first = evaluate(&habit, BASE_MS + early);
        let second = evaluate(&habit, BASE_MS + late);
        prop_assert_eq!(first.state, DisplayState::OnTrack);
        prop_assert_eq!(second.state, DisplayState::OnTrack);
        prop_assert!((0.0..=1.0).contains(&first.cadence_progress));
        prop_assert!((0.0..=1.0).contains(&second.cadence_progress));
        if early < late {
            prop_assert!(first.cadence_progress > second.cadence_progress);
        }
    }

    #[test]
    fn grace_window_reports_grace_period(
        (cadence, grace) in windows(),
        count in 1usize..20,
        offset_ms in 1i64..=2_000_000_000,
    ) {
        let habit = habit_completed(cadence, grace, count);
        let offset_ms = 1 + (offset_ms - 1) % (grace * 1_000);
        let now = BASE_MS + cadence * 1_000 + offset_ms;

        let evaluation = evaluate(&habit, now);
        prop_assert_eq!(evaluation.state, DisplayState::GracePeriod);
        prop_assert!((0.0..=1.0).contains(&evaluation.grace_progress));
        prop_assert!((0.0..=1.0).contains(&evaluation.cadence_progress));
    }

    #[test]
    fn past_grace_is_streak_lost_with_zero_streak(
        (cadence, grace) in windows(),
        count in 1usize..20,
        overshoot_ms in 1i64..=10_000_000_000,
    ) {
        let habit = habit_completed(cadence, grace, count);
        let now = BASE_MS + (cadence + grace) * 1_000 + overshoot_ms;

        let evaluation = evaluate(&habit, now);
        prop_assert_eq!(evaluation.state, DisplayState::StreakLost);
        prop_assert_eq!(current_streak(&habit, now), 0);
        prop_assert_eq!(evaluation.grace_progress, 0.0);
    }

    #[test]
    fn freeze_holds_until_next_completion(
        (cadence, grace) in windows(),
        count in 0usize..20,
        later_ms in 0i64..=100_000_000_000,
    ) {
        let mut habit = habit_completed(cadence, grace, count);
        record_freeze(&mut habit, BASE_MS);

        let evaluation = evaluate(&habit, BASE_MS + later_ms);
        prop_assert_eq!(evaluation.state, DisplayState::Frozen);
        prop_assert_eq!(evaluation.cadence_progress, 1.0);

        let at = BASE_MS + later_ms;
        record_completion(&mut habit, Completion::new(at), StreakResetPolicy::WipeLedger);
        prop_assert_eq!(evaluate(&habit, at).state, DisplayState::OnTrack);
    }

    #[test]
    fn repeated_milestone_check_grants_at_most_once(count in 0usize..40) {
        let mut habit = habit_completed(DAY, DAY, count);
        let first = check_milestone(&mut habit);
        let second = check_milestone(&mut habit);
        prop_assert!(second.is_none());
        prop_assert_eq!(first.is_some(), count > 0 && count % 5 == 0);
    }

    #[test]
    fn predicate_matches_rule(n in 0u32..200, last in (0u32..40).prop_map(|k| k * 5)) {
        prop_assert_eq!(would_grant_at(n, last), n > 0 && n % 5 == 0 && n > last);
    }
}

#[test]
fn grace_progress_partway_through_grace_window() {
    let habit = habit_completed(DAY, DAY, 3);
    let evaluation = evaluate(&habit, BASE_MS + 90_000 * 1_000);
    assert_eq!(evaluation.state, DisplayState::GracePeriod);
    let expected = 1.0 - (90_000.0 - 86_400.0) / 86_400.0;
    assert!((evaluation.grace_progress - expected).abs() < 1e-9);
    assert!((evaluation.grace_progress - 0.958).abs() < 1e-3);
}

#[test]
fn streak_lost_after_cadence_and_grace() {
    let habit = habit_completed(DAY, DAY, 3);
    let now = BASE_MS + 200_000 * 1_000;
    assert_eq!(evaluate(&habit, now).state, DisplayState::StreakLost);
    assert_eq!(current_streak(&habit, now), 0);
}

#[test]
fn milestone_granted_once_per_multiple_of_five() {
    let mut habit = Habit::new("Read", "📚", DAY, DAY, 0);
    let mut grants = Vec::new();
    for day in 1..=11 {
        let outcome = record_completion(
            &mut habit,
            Completion::new(day * DAY_MS),
            StreakResetPolicy::WipeLedger,
        );
        grants.push(outcome.milestone_granted);
        if (5..10).contains(&day) {
            assert_eq!(habit.last_awarded_milestone, 5);
        }
    }

    let granted: Vec<(usize, u32)> = grants
        .iter()
        .enumerate()
        .filter_map(|(index, grant)| grant.map(|value| (index + 1, value)))
        .collect();
    assert_eq!(granted, vec![(5, 5), (10, 10)]);
    assert_eq!(habit.last_awarded_milestone, 10);
}

#[test]
fn lapsed_completion_wipes_ledger() {
    let mut habit = Habit::new("Run", "🏃", DAY, DAY, 0);
    for day in 0..12 {
        record_completion(
            &mut habit,
            Completion::new(day * DAY_MS),
            StreakResetPolicy::WipeLedger,
        );
    }
    assert_eq!(habit.last_awarded_milestone, 10);

    // Two windows plus three more days without a completion.
    let now = 11 * DAY_MS + 2 * DAY_MS + 3 * DAY_MS;
    assert_eq!(evaluate(&habit, now).state, DisplayState::StreakLost);

    let outcome = record_completion(&mut habit, Completion::new(now), StreakResetPolicy::WipeLedger);
    assert!(outcome.streak_reset);
    assert_eq!(habit.total_completions(), 1);
    assert_eq!(habit.last_awarded_milestone, 0);
    assert_eq!(current_streak(&habit, now), 1);
}

#[test]
fn keep_history_resets_run_without_losing_totals() {
    let mut habit = Habit::new("Run", "🏃", DAY, DAY, 0);
    for day in 0..12 {
        record_completion(
            &mut habit,
            Completion::new(day * DAY_MS),
            StreakResetPolicy::KeepHistory,
        );
    }
    let now = 16 * DAY_MS;

    let outcome =
        record_completion(&mut habit, Completion::new(now), StreakResetPolicy::KeepHistory);
    assert!(outcome.streak_reset);
    assert_eq!(habit.total_completions(), 13);
    assert_eq!(habit.run_length(), 1);
    assert_eq!(habit.last_awarded_milestone, 0);
    assert_eq!(current_streak(&habit, now), 1);
}

#[test]
fn never_started_is_not_streak_lost() {
    let habit = Habit::new("Journal", "✍️", DAY, DAY, 0);
    let evaluation = evaluate(&habit, BASE_MS);
    assert_eq!(evaluation.state, DisplayState::NeverStarted);
    assert_eq!(evaluation.cadence_progress, 0.0);
    assert_eq!(current_streak(&habit, BASE_MS), 0);
}
