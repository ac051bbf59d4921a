use serde::Serialize;
use serde_json::{Map, Value};

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .into_iter()
                .map(|(k, v)| (k, sort_keys(v)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut out = Map::new();
            for (k, v) in entries {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        other => other,
    }
}

/// Pretty JSON with recursively sorted object keys, so persisted files and
/// `--format json` output are byte-stable across runs.
pub fn stable_to_string_pretty<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string_pretty(&sort_keys(serde_json::to_value(
        value,
    )?))?)
}
