use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Recurrence rule. Closed inside the crate; the open-string form the store may
/// contain is normalized at the serde boundary (`from_label`), so no scheduling
/// code ever sees an unrecognized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Frequency {
    #[default]
    OneTime,
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_label(self) -> &'static str {
        match self {
            Frequency::OneTime => "none",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    /// Ingestion fallback: absent/"none" means one-time, anything unrecognized
    /// degrades to daily rather than failing the decode.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "" | "none" | "once" | "one-time" => Frequency::OneTime,
            "daily" => Frequency::Daily,
            "weekly" => Frequency::Weekly,
            "monthly" => Frequency::Monthly,
            _ => Frequency::Daily,
        }
    }
}

impl Serialize for Frequency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_label())
    }
}

impl<'de> Deserialize<'de> for Frequency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(Frequency::from_label(label.as_deref().unwrap_or("")))
    }
}

/// Persisted as full English names; the CLI also accepts three-letter forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn from_iso(iso: u8) -> Option<Self> {
        match iso {
            1 => Some(Weekday::Monday),
            2 => Some(Weekday::Tuesday),
            3 => Some(Weekday::Wednesday),
            4 => Some(Weekday::Thursday),
            5 => Some(Weekday::Friday),
            6 => Some(Weekday::Saturday),
            7 => Some(Weekday::Sunday),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "mon" | "monday" => Some(Weekday::Monday),
            "tue" | "tuesday" => Some(Weekday::Tuesday),
            "wed" | "wednesday" => Some(Weekday::Wednesday),
            "thu" | "thursday" => Some(Weekday::Thursday),
            "fri" | "friday" => Some(Weekday::Friday),
            "sat" | "saturday" => Some(Weekday::Saturday),
            "sun" | "sunday" => Some(Weekday::Sunday),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub frequency: Frequency,
    pub start_date: String,
    /// Weekly habits only. Empty for a weekly habit is a malformed schedule:
    /// the activity predicate never matches and the resolver falls back to
    /// `start_date`.
    #[serde(default)]
    pub selected_days: BTreeSet<Weekday>,
    /// One-time habits: stay active on/after `start_date` until completed
    /// instead of disappearing the day after.
    #[serde(default)]
    pub keep_until: bool,
    #[serde(default)]
    pub snoozed_until: Option<String>,
    /// Cycle-start keys marked complete. Membership is the only semantics.
    #[serde(default)]
    pub completion_history: BTreeSet<String>,
    /// Cycle-start key -> accumulated progress amount (miles, reps, ...).
    #[serde(default)]
    pub increment_history: BTreeMap<String, f64>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub best_streak: u32,
    #[serde(default)]
    pub last_completed_date: Option<String>,
    #[serde(default)]
    pub archived: bool,
}
