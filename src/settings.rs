use crate::date::ResetTime;
use crate::error::CliError;
use crate::store::{KvStore, RESET_TIME_KEY};
use serde::Deserialize;
use serde_json::json;

/// Both stored shapes: the current 24-hour `{hour, minute}` and the legacy
/// 12-hour `{hour, minute, meridiem}` encoding.
#[derive(Debug, Deserialize)]
struct StoredResetTime {
    hour: u32,
    minute: u32,
    #[serde(default)]
    meridiem: Option<String>,
}

fn normalize(raw: StoredResetTime) -> Option<ResetTime> {
    if raw.minute > 59 {
        return None;
    }
    match raw.meridiem.as_deref() {
        None => {
            if raw.hour > 23 {
                return None;
            }
            Some(ResetTime {
                hour: raw.hour,
                minute: raw.minute,
            })
        }
        Some(meridiem) => {
            // Legacy 12-hour clock: 12 AM is midnight, 12 PM is noon.
            if !(1..=12).contains(&raw.hour) {
                return None;
            }
            let hour = match meridiem.to_uppercase().as_str() {
                "AM" => raw.hour % 12,
                "PM" => raw.hour % 12 + 12,
                _ => return None,
            };
            Some(ResetTime {
                hour,
                minute: raw.minute,
            })
        }
    }
}

/// The stored day boundary, defaulting to midnight on absence or any decode
/// problem. Never errors: a broken setting must not take scheduling down.
pub fn load_reset_time(store: &dyn KvStore) -> ResetTime {
    let value = match store.get(RESET_TIME_KEY) {
        Ok(Some(v)) => v,
        Ok(None) => return ResetTime::default(),
        Err(err) => {
            tracing::warn!(%err, "reset time read failed, using midnight");
            return ResetTime::default();
        }
    };

    match serde_json::from_value::<StoredResetTime>(value).ok().and_then(normalize) {
        Some(reset) => reset,
        None => {
            tracing::warn!("stored reset time is malformed, using midnight");
            ResetTime::default()
        }
    }
}

pub fn save_reset_time(store: &mut dyn KvStore, reset: ResetTime) -> Result<(), CliError> {
    if reset.hour > 23 || reset.minute > 59 {
        return Err(CliError::usage(format!(
            "Invalid reset time: {:02}:{:02}",
            reset.hour, reset.minute
        )));
    }
    store.set(
        RESET_TIME_KEY,
        json!({"hour": reset.hour, "minute": reset.minute}),
    )
}
