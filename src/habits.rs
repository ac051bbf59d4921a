use crate::date::parse_date_key;
use crate::error::CliError;
use crate::model::{Frequency, Habit, Weekday};
use crate::store::{KvStore, HABITS_KEY};
use std::collections::BTreeSet;

/// Habit data is the source of truth, so unlike the cache a corrupt record is
/// an error here, not a silent miss.
pub fn load_habits(store: &dyn KvStore) -> Result<Vec<Habit>, CliError> {
    match store.get(HABITS_KEY)? {
        Some(value) => {
            serde_json::from_value(value).map_err(|_| CliError::io("Habit data corrupted"))
        }
        None => Ok(Vec::new()),
    }
}

pub fn save_habits(store: &mut dyn KvStore, habits: &[Habit]) -> Result<(), CliError> {
    let value = serde_json::to_value(habits).map_err(|_| CliError::io("Store IO error"))?;
    store.set(HABITS_KEY, value)
}

pub fn next_habit_id(habits: &[Habit]) -> String {
    let max = habits
        .iter()
        .filter_map(|h| h.id.strip_prefix('h'))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("h{:04}", max + 1)
}

pub fn stable_habit_sort(a: &Habit, b: &Habit) -> std::cmp::Ordering {
    let an = a.name.to_lowercase();
    let bn = b.name.to_lowercase();
    match an.cmp(&bn) {
        std::cmp::Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    }
}

/// Exact id (`h0001`) or unique case-insensitive name prefix.
pub fn select_habit(habits: &[Habit], selector: &str) -> Result<usize, CliError> {
    let s = selector.trim();
    if s.is_empty() {
        return Err(CliError::usage("Habit selector is required"));
    }

    if s.len() == 5 && s.starts_with('h') && s[1..].chars().all(|c| c.is_ascii_digit()) {
        return habits
            .iter()
            .position(|h| h.id == s)
            .ok_or_else(|| CliError::not_found(format!("Habit not found: {}", selector)));
    }

    let prefix = s.to_lowercase();
    let mut matches: Vec<usize> = habits
        .iter()
        .enumerate()
        .filter(|(_, h)| h.name.to_lowercase().starts_with(&prefix))
        .map(|(i, _)| i)
        .collect();
    matches.sort_by(|&a, &b| stable_habit_sort(&habits[a], &habits[b]));

    match matches.len() {
        0 => Err(CliError::not_found(format!(
            "Habit not found: {}",
            selector
        ))),
        1 => Ok(matches[0]),
        _ => {
            let candidates = matches
                .iter()
                .map(|&i| format!("{} {}", habits[i].id, habits[i].name))
                .collect::<Vec<String>>()
                .join(", ");
            Err(CliError::ambiguous(format!(
                "Ambiguous selector '{}'. Candidates: {}",
                selector, candidates
            )))
        }
    }
}

pub fn make_habit(
    id: String,
    name: &str,
    frequency: Frequency,
    start_date: &str,
    selected_days: BTreeSet<Weekday>,
    keep_until: bool,
) -> Result<Habit, CliError> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(CliError::usage("Habit name is required"));
    }
    parse_date_key(start_date)?;

    if frequency == Frequency::Weekly && selected_days.is_empty() {
        return Err(CliError::usage("Weekly habits need at least one --days entry"));
    }
    if frequency != Frequency::Weekly && !selected_days.is_empty() {
        return Err(CliError::usage("--days only applies to weekly habits"));
    }
    if keep_until && frequency != Frequency::OneTime {
        return Err(CliError::usage("--keep-until only applies to one-time habits"));
    }

    Ok(Habit {
        id,
        name,
        frequency,
        start_date: start_date.to_string(),
        selected_days,
        keep_until,
        snoozed_until: None,
        completion_history: BTreeSet::new(),
        increment_history: Default::default(),
        streak: 0,
        best_streak: 0,
        last_completed_date: None,
        archived: false,
    })
}

/// Records a completion under the cycle key. Returns false when the cycle was
/// already complete; counters only move on the first completion of a cycle.
pub fn mark_done(habit: &mut Habit, cycle: &str) -> bool {
    if !habit.completion_history.insert(cycle.to_string()) {
        return false;
    }
    habit.streak += 1;
    habit.best_streak = habit.best_streak.max(habit.streak);
    habit.last_completed_date = Some(cycle.to_string());
    true
}

/// Removes a completion. Returns false when the cycle was not complete.
pub fn mark_undone(habit: &mut Habit, cycle: &str) -> bool {
    if !habit.completion_history.remove(cycle) {
        return false;
    }
    habit.streak = habit.streak.saturating_sub(1);
    if habit.last_completed_date.as_deref() == Some(cycle) {
        habit.last_completed_date = habit.completion_history.iter().next_back().cloned();
    }
    true
}

/// Accumulates progress for the cycle and returns the new total.
pub fn add_increment(habit: &mut Habit, cycle: &str, amount: f64) -> Result<f64, CliError> {
    if !(amount > 0.0) {
        return Err(CliError::usage("Invalid amount"));
    }
    let entry = habit.increment_history.entry(cycle.to_string()).or_insert(0.0);
    *entry += amount;
    Ok(*entry)
}

pub fn snooze(habit: &mut Habit, until: &str) -> Result<(), CliError> {
    parse_date_key(until)?;
    habit.snoozed_until = Some(until.to_string());
    Ok(())
}

pub fn unsnooze(habit: &mut Habit) {
    habit.snoozed_until = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn habit(id: &str, name: &str) -> Habit {
        make_habit(
            id.to_string(),
            name,
            Frequency::Daily,
            "2024-01-01",
            BTreeSet::new(),
            false,
        )
        .unwrap()
    }

    #[test]
    fn habits_roundtrip_through_the_store() {
        let mut store = MemStore::default();
        assert!(load_habits(&store).unwrap().is_empty());

        save_habits(&mut store, &[habit("h0001", "Run")]).unwrap();
        let loaded = load_habits(&store).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "h0001");
    }

    #[test]
    fn ids_continue_past_the_highest_existing() {
        assert_eq!(next_habit_id(&[]), "h0001");
        assert_eq!(
            next_habit_id(&[habit("h0001", "a"), habit("h0007", "b")]),
            "h0008"
        );
    }

    #[test]
    fn selector_finds_by_id_and_prefix() {
        let habits = vec![habit("h0001", "Stretch"), habit("h0002", "Read")];
        assert_eq!(select_habit(&habits, "h0002").unwrap(), 1);
        assert_eq!(select_habit(&habits, "str").unwrap(), 0);
        assert_eq!(select_habit(&habits, "READ").unwrap(), 1);
        assert_eq!(select_habit(&habits, "swim").unwrap_err().exit_code, 3);
    }

    #[test]
    fn ambiguous_prefix_is_exit_code_4() {
        let habits = vec![habit("h0001", "Stretch"), habit("h0002", "Study")];
        let err = select_habit(&habits, "st").unwrap_err();
        assert_eq!(err.exit_code, 4);
        assert!(err.message.contains("h0001"));
        assert!(err.message.contains("h0002"));
    }

    #[test]
    fn make_habit_validates_the_schedule() {
        assert!(make_habit(
            "h0001".to_string(),
            "Run",
            Frequency::Weekly,
            "2024-01-01",
            BTreeSet::new(),
            false,
        )
        .is_err());

        assert!(make_habit(
            "h0001".to_string(),
            "Run",
            Frequency::Daily,
            "2024-13-01",
            BTreeSet::new(),
            false,
        )
        .is_err());

        assert!(make_habit(
            "h0001".to_string(),
            "Run",
            Frequency::Daily,
            "2024-01-01",
            BTreeSet::new(),
            true,
        )
        .is_err());
    }

    #[test]
    fn done_is_idempotent_per_cycle() {
        let mut h = habit("h0001", "Run");
        assert!(mark_done(&mut h, "2024-01-04"));
        assert!(!mark_done(&mut h, "2024-01-04"));
        assert_eq!(h.streak, 1);
        assert_eq!(h.best_streak, 1);
        assert_eq!(h.last_completed_date.as_deref(), Some("2024-01-04"));
    }

    #[test]
    fn undone_rolls_the_counters_back() {
        let mut h = habit("h0001", "Run");
        mark_done(&mut h, "2024-01-04");
        mark_done(&mut h, "2024-01-05");
        assert!(mark_undone(&mut h, "2024-01-05"));
        assert_eq!(h.streak, 1);
        assert_eq!(h.last_completed_date.as_deref(), Some("2024-01-04"));
        assert!(!mark_undone(&mut h, "2024-01-05"));
    }

    #[test]
    fn increments_accumulate_per_cycle() {
        let mut h = habit("h0001", "Run");
        assert_eq!(add_increment(&mut h, "2024-01-04", 1.5).unwrap(), 1.5);
        assert_eq!(add_increment(&mut h, "2024-01-04", 2.0).unwrap(), 3.5);
        assert_eq!(add_increment(&mut h, "2024-01-05", 1.0).unwrap(), 1.0);
        assert!(add_increment(&mut h, "2024-01-04", 0.0).is_err());
        assert!(add_increment(&mut h, "2024-01-04", -1.0).is_err());
    }
}
