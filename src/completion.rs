use crate::active::is_active;
use crate::cycle::resolve_cycle_start;
use crate::date::{LocalStamp, ResetTime};
use crate::model::Habit;

/// A habit annotated with its scheduling state for one moment. Completion and
/// progress are looked up under the resolved cycle key, never the calendar
/// day.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HabitStatus {
    pub habit: Habit,
    pub cycle: String,
    pub active: bool,
    pub completed: bool,
    pub increment_amount: f64,
}

/// Annotates every habit in the list. Pure, order-preserving and total: it
/// never filters, so callers decide what to display.
pub fn with_completion(habits: &[Habit], stamp: &LocalStamp, reset: ResetTime) -> Vec<HabitStatus> {
    habits
        .iter()
        .map(|habit| {
            let cycle = resolve_cycle_start(habit, stamp, reset);
            let completed = habit.completion_history.contains(&cycle);
            let increment_amount = habit.increment_history.get(&cycle).copied().unwrap_or(0.0);
            HabitStatus {
                active: is_active(habit, stamp, reset),
                completed,
                increment_amount,
                cycle,
                habit: habit.clone(),
            }
        })
        .collect()
}
