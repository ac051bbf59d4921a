use crate::date::{add_days, diff_days, effective_date_key, epoch_millis, LocalStamp, ResetTime};
use crate::error::CliError;
use crate::model::Habit;
use crate::store::{KvStore, HABITS_CACHE_KEY};
use serde::{Deserialize, Serialize};

/// The cache is authoritative for today plus/minus this many days.
pub const CACHE_WINDOW_DAYS: i64 = 3;

/// The persisted cache record. Created or overwritten wholesale on every sync,
/// never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEnvelope {
    pub habits: Vec<Habit>,
    pub cached_at: u64,
    pub cached_for_dates: Vec<String>,
}

/// Effective today plus/minus `CACHE_WINDOW_DAYS`, as effective date keys.
pub fn cache_window(stamp: &LocalStamp, reset: ResetTime) -> Vec<String> {
    let today = effective_date_key(stamp, reset);
    (-CACHE_WINDOW_DAYS..=CACHE_WINDOW_DAYS)
        .filter_map(|offset| add_days(&today, offset).ok())
        .collect()
}

/// True iff `date` is at most `CACHE_WINDOW_DAYS` whole days from the moment's
/// effective day, in either direction. Independent of what
/// `cached_for_dates` literally lists.
pub fn is_within_window(date: &str, stamp: &LocalStamp, reset: ResetTime) -> bool {
    let today = effective_date_key(stamp, reset);
    match diff_days(&today, date) {
        Ok(days) => days.abs() <= CACHE_WINDOW_DAYS,
        Err(_) => false,
    }
}

/// Strict decode of the current envelope shape. `None` on any miss, decode
/// failure or store error; the cache is an optimization, never a source of
/// truth.
pub fn read_envelope(store: &dyn KvStore) -> Option<CacheEnvelope> {
    let value = match store.get(HABITS_CACHE_KEY) {
        Ok(Some(v)) => v,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(%err, "habits cache read failed, treating as miss");
            return None;
        }
    };
    serde_json::from_value(value).ok()
}

/// Cached habit set, tolerating the legacy bare-list payload shape. A payload
/// matching neither shape is discarded, not repaired.
pub fn read_cache(store: &dyn KvStore) -> Option<Vec<Habit>> {
    let value = match store.get(HABITS_CACHE_KEY) {
        Ok(Some(v)) => v,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(%err, "habits cache read failed, treating as miss");
            return None;
        }
    };

    if let Ok(envelope) = serde_json::from_value::<CacheEnvelope>(value.clone()) {
        return Some(envelope.habits);
    }
    if let Ok(habits) = serde_json::from_value::<Vec<Habit>>(value) {
        // legacy shape
        return Some(habits);
    }

    tracing::warn!("habits cache has an unrecognized shape, discarding");
    None
}

/// Full overwrite of the cache record; no merge with whatever was there.
/// `cached_at` and the window are derived from the caller's stamp, never from
/// the wall clock.
pub fn write_cache(
    store: &mut dyn KvStore,
    habits: &[Habit],
    stamp: &LocalStamp,
    reset: ResetTime,
) -> Result<(), CliError> {
    let envelope = CacheEnvelope {
        habits: habits.to_vec(),
        cached_at: epoch_millis(stamp),
        cached_for_dates: cache_window(stamp, reset),
    };
    let value = serde_json::to_value(&envelope).map_err(|_| CliError::io("Store IO error"))?;
    store.set(HABITS_CACHE_KEY, value)
}

/// Drops the cache record. Failures are logged and swallowed; the next read
/// simply misses.
pub fn invalidate(store: &mut dyn KvStore) {
    if let Err(err) = store.remove(HABITS_CACHE_KEY) {
        tracing::warn!(%err, "habits cache invalidation failed");
    }
}
