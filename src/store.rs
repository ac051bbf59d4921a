use crate::error::CliError;
use crate::stable_json::stable_to_string_pretty;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

pub const HABITS_KEY: &str = "habits";
pub const HABITS_CACHE_KEY: &str = "habits_cache";
pub const RESET_TIME_KEY: &str = "reset_time";
pub const TOTAL_POINTS_KEY: &str = "total_points";

/// Durable string-keyed storage. The cache, settings and points layers sit on
/// top of this and convert its failures into logged defaults; habit data is
/// the one consumer that surfaces them.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<Value>, CliError>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), CliError>;
    fn remove(&mut self, key: &str) -> Result<(), CliError>;
}

pub fn resolve_store_path(cli_store_path: Option<&str>) -> Result<String, CliError> {
    if let Some(p) = cli_store_path.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        return Ok(p.to_string());
    }

    if let Ok(p) = std::env::var("HABITBOARD_STORE_PATH") {
        let p = p.trim().to_string();
        if !p.is_empty() {
            return Ok(p);
        }
    }

    let base = std::env::var("XDG_DATA_HOME")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let home = std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok());

    let base = match (base, home) {
        (Some(b), _) => b,
        (None, Some(h)) => Path::new(&h)
            .join(".local")
            .join("share")
            .to_string_lossy()
            .to_string(),
        (None, None) => return Err(CliError::io("Store IO error")),
    };

    Ok(Path::new(&base)
        .join("habitboard")
        .join("store.json")
        .to_string_lossy()
        .to_string())
}

/// One JSON object file. Writes are whole-file overwrites: temp file, then
/// rename, under a sibling `.lock` file so two writers cannot interleave.
pub struct FileStore {
    path: String,
}

impl FileStore {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<BTreeMap<String, Value>, CliError> {
        match fs::read_to_string(&self.path) {
            Ok(txt) => {
                serde_json::from_str(&txt).map_err(|_| CliError::io("Store corrupted"))
            }
            Err(e) => {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Ok(BTreeMap::new())
                } else {
                    Err(CliError::io("Store IO error"))
                }
            }
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, Value>) -> Result<(), CliError> {
        ensure_parent_dir(&self.path)?;

        let dir = Path::new(&self.path)
            .parent()
            .ok_or_else(|| CliError::io("Store IO error"))?;

        let tmp_path = dir.join(format!(".store.json.tmp.{}", std::process::id()));
        let data =
            stable_to_string_pretty(entries).map_err(|_| CliError::io("Store IO error"))? + "\n";

        {
            let mut f = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)
                .map_err(|_| CliError::io("Store IO error"))?;

            #[cfg(unix)]
            {
                let _ = f.set_permissions(fs::Permissions::from_mode(0o600));
            }

            f.write_all(data.as_bytes())
                .map_err(|_| CliError::io("Store IO error"))?;
            let _ = f.flush();
        }

        fs::rename(&tmp_path, &self.path).map_err(|_| {
            let _ = fs::remove_file(&tmp_path);
            CliError::io("Store IO error")
        })?;

        #[cfg(unix)]
        {
            let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600));
        }

        Ok(())
    }

    fn with_write_lock<R>(&self, f: impl FnOnce() -> Result<R, CliError>) -> Result<R, CliError> {
        let lock_path = PathBuf::from(format!("{}.lock", self.path));

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => {
                #[cfg(unix)]
                {
                    let _ = file.set_permissions(fs::Permissions::from_mode(0o600));
                }
                let _guard = LockGuard { path: lock_path };
                f()
            }
            Err(e) => {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    Err(CliError::io("Store is locked"))
                } else {
                    Err(CliError::io("Store IO error"))
                }
            }
        }
    }
}

struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn ensure_parent_dir(path: &str) -> Result<(), CliError> {
    let dir = Path::new(path)
        .parent()
        .ok_or_else(|| CliError::io("Store IO error"))?;
    fs::create_dir_all(dir).map_err(|_| CliError::io("Store IO error"))?;

    #[cfg(unix)]
    {
        let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
    }

    Ok(())
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, CliError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), CliError> {
        ensure_parent_dir(&self.path)?;
        self.with_write_lock(|| {
            let mut entries = self.read_all()?;
            entries.insert(key.to_string(), value);
            self.write_all(&entries)
        })
    }

    fn remove(&mut self, key: &str) -> Result<(), CliError> {
        ensure_parent_dir(&self.path)?;
        self.with_write_lock(|| {
            let mut entries = self.read_all()?;
            if entries.remove(key).is_some() {
                self.write_all(&entries)?;
            }
            Ok(())
        })
    }
}

/// In-memory store for unit tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemStore {
    entries: BTreeMap<String, Value>,
}

#[cfg(test)]
impl KvStore for MemStore {
    fn get(&self, key: &str) -> Result<Option<Value>, CliError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), CliError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), CliError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store whose reads and writes always fail, for failure-policy tests.
#[cfg(test)]
pub struct BrokenStore;

#[cfg(test)]
impl KvStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<Value>, CliError> {
        Err(CliError::io("Store IO error"))
    }

    fn set(&mut self, _key: &str, _value: Value) -> Result<(), CliError> {
        Err(CliError::io("Store IO error"))
    }

    fn remove(&mut self, _key: &str) -> Result<(), CliError> {
        Err(CliError::io("Store IO error"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_store_roundtrips_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = FileStore::new(path.to_string_lossy().to_string());

        assert_eq!(store.get("missing").unwrap(), None);

        store.set("total_points", json!(42)).unwrap();
        store.set("habits", json!([{"id": "h0001"}])).unwrap();

        assert_eq!(store.get("total_points").unwrap(), Some(json!(42)));
        assert_eq!(
            store.get("habits").unwrap(),
            Some(json!([{"id": "h0001"}]))
        );

        // Overwrite replaces the value wholesale.
        store.set("total_points", json!(7)).unwrap();
        assert_eq!(store.get("total_points").unwrap(), Some(json!(7)));

        store.remove("total_points").unwrap();
        assert_eq!(store.get("total_points").unwrap(), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let mut store = FileStore::new(path.to_string_lossy().to_string());
            store.set("reset_time", json!({"hour": 4, "minute": 0})).unwrap();
        }

        let store = FileStore::new(path.to_string_lossy().to_string());
        assert_eq!(
            store.get("reset_time").unwrap(),
            Some(json!({"hour": 4, "minute": 0}))
        );
    }

    #[test]
    fn corrupt_file_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(path.to_string_lossy().to_string());
        assert!(store.get("habits").is_err());
    }

    #[test]
    fn lock_file_is_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = FileStore::new(path.to_string_lossy().to_string());
        store.set("habits", json!([])).unwrap();

        assert!(!dir.path().join("store.json.lock").exists());
    }
}
