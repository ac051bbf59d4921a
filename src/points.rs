use crate::error::CliError;
use crate::store::{KvStore, TOTAL_POINTS_KEY};
use serde_json::Value;

/// Lifetime points counter. Absent or unreadable means zero; this layer never
/// errors on the read side.
pub fn total_points(store: &dyn KvStore) -> u64 {
    match store.get(TOTAL_POINTS_KEY) {
        Ok(Some(value)) => match value.as_u64() {
            Some(total) => total,
            None => {
                tracing::warn!("total points has a non-numeric value, defaulting to 0");
                0
            }
        },
        Ok(None) => 0,
        Err(err) => {
            tracing::warn!(%err, "total points read failed, defaulting to 0");
            0
        }
    }
}

/// Called by the completion action only; nothing in the scheduling core
/// increments points.
pub fn add_points(store: &mut dyn KvStore, delta: u64) -> Result<u64, CliError> {
    let total = total_points(store).saturating_add(delta);
    store.set(TOTAL_POINTS_KEY, Value::from(total))?;
    Ok(total)
}
