use crate::date::{
    add_days, date_key, days_in_month, effective_date_key, parse_date_key, weekday_of_key,
    CivilDate, LocalStamp, ResetTime,
};
use crate::model::{Frequency, Habit};

/// Canonical start date of the cycle `stamp` falls into. Completion and
/// increment lookups are always keyed by this, never by the calendar day, so a
/// habit missed on its scheduled day stays addressable under the same key
/// until the next cycle begins.
///
/// Total: malformed schedules degrade to `start_date` instead of failing.
pub fn resolve_cycle_start(habit: &Habit, stamp: &LocalStamp, reset: ResetTime) -> String {
    match habit.frequency {
        Frequency::OneTime => habit.start_date.clone(),
        Frequency::Daily => effective_date_key(stamp, reset),
        Frequency::Weekly => weekly_cycle_start(habit, stamp, reset),
        Frequency::Monthly => monthly_cycle_start(habit, stamp, reset),
    }
}

/// Most recent day on/before the effective day that is in `selected_days` and
/// not before `start_date`. The scan is bounded at 7 days; a schedule that
/// never matches (empty day set, unparsable dates) falls back to `start_date`.
fn weekly_cycle_start(habit: &Habit, stamp: &LocalStamp, reset: ResetTime) -> String {
    let mut cursor = effective_date_key(stamp, reset);
    for _ in 0..7 {
        if cursor.as_str() < habit.start_date.as_str() {
            break;
        }
        match weekday_of_key(&cursor) {
            Ok(day) if habit.selected_days.contains(&day) => return cursor,
            Ok(_) => {}
            Err(_) => break,
        }
        cursor = match add_days(&cursor, -1) {
            Ok(prev) => prev,
            Err(_) => break,
        };
    }
    habit.start_date.clone()
}

/// Same day-of-month as `start_date`, rolling back one month when the
/// effective day has not reached it yet. The forced day-of-month clamps to the
/// last valid day of the target month (a habit started on the 31st resolves to
/// Feb 29 in a leap year).
fn monthly_cycle_start(habit: &Habit, stamp: &LocalStamp, reset: ResetTime) -> String {
    let start = match parse_date_key(&habit.start_date) {
        Ok(date) => date,
        Err(_) => return habit.start_date.clone(),
    };
    let eff = match parse_date_key(&effective_date_key(stamp, reset)) {
        Ok(date) => date,
        Err(_) => return habit.start_date.clone(),
    };

    let (mut year, mut month) = (eff.year, eff.month);
    if eff.day < start.day {
        if month == 1 {
            year -= 1;
            month = 12;
        } else {
            month -= 1;
        }
    }

    let day = start.day.min(days_in_month(year, month));
    date_key(CivilDate { year, month, day })
}
