//! Denormalized habit records published for the widget.
//!
//! Records are never authoritative. The widget may patch them
//! optimistically, and the next publish from canonical state overwrites
//! those patches.

use crate::lifecycle::DisplayState;
use crate::model::habit::{Habit, HabitId, DEFAULT_GRACE_SECONDS};
use crate::service::read_model::HabitView;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const PLACEHOLDER_CADENCE_SECONDS: i64 = 86_400;

/// One habit as the widget renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionRecord {
    pub id: HabitId,
    pub name: String,
    pub emoji: String,
    pub streak: u32,
    /// Ring fill in `[0, 1]`.
    pub progress: f64,
    /// Display state tag, e.g. `onTrack`.
    pub state: String,
    pub last_completed_at: Option<i64>,
    pub cadence_seconds: i64,
    #[serde(rename = "gracePeriodSeconds")]
    pub grace_seconds: i64,
}

impl ProjectionRecord {
    pub fn from_view(view: &HabitView) -> Self {
        Self {
            id: view.habit_id,
            name: view.name.clone(),
            emoji: view.emoji.clone(),
            streak: view.current_streak,
            progress: view.ring_progress(),
            state: view.state.as_tag().to_string(),
            last_completed_at: view.last_completed_at,
            cadence_seconds: view.cadence_seconds,
            grace_seconds: view.grace_seconds,
        }
    }

    pub fn project(habit: &Habit, now_ms: i64) -> Self {
        Self::from_view(&HabitView::build(habit, now_ms))
    }

    /// Parsed state tag. Unknown tags render as on track.
    pub fn display_state(&self) -> DisplayState {
        DisplayState::from_tag(&self.state).unwrap_or(DisplayState::OnTrack)
    }

    /// Widget-side shortcut applied before the canonical merge.
    ///
    /// No reset or milestone logic runs here.
    pub fn apply_optimistic_completion(&mut self, now_ms: i64) {
        self.streak = self.streak.saturating_add(1);
        self.progress = 1.0;
        self.state = DisplayState::OnTrack.as_tag().to_string();
        self.last_completed_at = Some(now_ms);
    }
}

/// Sample set shown when no readable projection exists.
///
/// Ids are stable so repeated loads render identically.
pub fn placeholder_records() -> Vec<ProjectionRecord> {
    const SAMPLES: [(&str, &str, u32, f64, DisplayState); 16] = [
        ("Meditate", "🧘", 12, 0.8, DisplayState::OnTrack),
        ("Exercise", "💪", 5, 0.3, DisplayState::GracePeriod),
        ("Read", "📚", 8, 0.6, DisplayState::OnTrack),
        ("Journal", "✍️", 3, 1.0, DisplayState::Frozen),
        ("Water", "💧", 15, 0.9, DisplayState::OnTrack),
        ("Walk", "🚶", 7, 0.5, DisplayState::OnTrack),
        ("Sleep", "😴", 4, 0.7, DisplayState::OnTrack),
        ("Vitamins", "💊", 20, 0.4, DisplayState::GracePeriod),
        ("Stretch", "🤸", 6, 0.85, DisplayState::OnTrack),
        ("Piano", "🎹", 2, 0.2, DisplayState::GracePeriod),
        ("Code", "💻", 30, 0.95, DisplayState::OnTrack),
        ("Cook", "🍳", 11, 0.6, DisplayState::OnTrack),
        ("Clean", "🧹", 1, 0.1, DisplayState::GracePeriod),
        ("Floss", "🦷", 9, 0.75, DisplayState::OnTrack),
        ("Gratitude", "🙏", 14, 0.55, DisplayState::OnTrack),
        ("No Phone", "📵", 0, 0.0, DisplayState::StreakLost),
    ];

    SAMPLES
        .iter()
        .zip(1u128..)
        .map(|((name, emoji, streak, progress, state), seq)| ProjectionRecord {
            id: Uuid::from_u128(seq),
            name: (*name).to_string(),
            emoji: (*emoji).to_string(),
            streak: *streak,
            progress: *progress,
            state: state.as_tag().to_string(),
            last_completed_at: None,
            cadence_seconds: PLACEHOLDER_CADENCE_SECONDS,
            grace_seconds: DEFAULT_GRACE_SECONDS,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{placeholder_records, ProjectionRecord};
    use crate::lifecycle::DisplayState;
    use crate::model::completion::Completion;
    use crate::model::habit::Habit;

    #[test]
    fn grace_period_projects_grace_progress() {
        let mut habit = Habit::new("Run", "🏃", 3_600, 3_600, 0);
        habit.push_completion(Completion::new(0));

        let record = ProjectionRecord::project(&habit, 5_400_000);
        assert_eq!(record.display_state(), DisplayState::GracePeriod);
        assert!((record.progress - 0.5).abs() < 1e-9);
        assert_eq!(record.streak, 1);
    }

    #[test]
    fn serializes_with_widget_field_names() {
        let record = placeholder_records().remove(0);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["state"], "onTrack");
        assert_eq!(json["gracePeriodSeconds"], 86_400);
        assert!(json.get("lastCompletedAt").is_some());
    }

    #[test]
    fn unknown_state_tag_renders_on_track() {
        let mut record = placeholder_records().remove(1);
        record.state = "sparkling".to_string();
        assert_eq!(record.display_state(), DisplayState::OnTrack);
    }

    #[test]
    fn optimistic_completion_skips_reset_logic() {
        let mut lost = placeholder_records().pop().unwrap();
        assert_eq!(lost.display_state(), DisplayState::StreakLost);

        lost.apply_optimistic_completion(42);
        assert_eq!(lost.streak, 1);
        assert_eq!(lost.progress, 1.0);
        assert_eq!(lost.display_state(), DisplayState::OnTrack);
        assert_eq!(lost.last_completed_at, Some(42));
    }

    #[test]
    fn placeholder_ids_are_stable() {
        assert_eq!(placeholder_records(), placeholder_records());
        assert_eq!(placeholder_records().len(), 16);
    }
}
