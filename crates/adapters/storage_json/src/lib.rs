//! # burrow-adapter-storage-json
//!
//! Durable key-value store backed by a single JSON object on disk.
//!
//! ## Responsibilities
//! - Implement the `KeyValueStore` port defined in `burrow-app::ports::storage`
//! - Load the snapshot at startup, discarding unreadable content
//! - Replace the file atomically on every write (temp file, then rename)
//!
//! ## Dependency rule
//! Depends on `burrow-app` (for port traits) and `burrow-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod error;

use std::future::Future;
use std::path::{Path, PathBuf};

use burrow_app::ports::KeyValueStore;
use burrow_domain::error::BurrowError;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

pub use error::StorageError;

/// Default location of the snapshot file.
pub const DEFAULT_PATH: &str = "cache/datastore.json";

/// JSON snapshot store.
///
/// The whole map is kept in memory; writes are serialised by a lock held
/// across the file replacement so the file always reflects the last write.
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Load the store from `path`.
    ///
    /// A missing file yields an empty store. A file that is not a JSON
    /// object is logged and discarded.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the file exists but cannot be read.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let values = match tokio::fs::read(&path).await {
            Ok(raw) => parse_snapshot(&path, &raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no datastore yet, starting empty");
                Map::new()
            }
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        tracing::debug!(path = %path.display(), keys = values.len(), "datastore loaded");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&self, values: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error(parent))?;
        }
        let body = serde_json::to_vec_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await.map_err(io_error(&tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(io_error(&self.path))?;
        Ok(())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError {
    let path = path.to_path_buf();
    move |source| StorageError::Io { path, source }
}

fn parse_snapshot(path: &Path, raw: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            tracing::warn!(path = %path.display(), kind = json_kind(&other), "datastore is not an object, discarding");
            Map::new()
        }
        Err(err) => {
            tracing::warn!(%err, path = %path.display(), "datastore is not valid JSON, discarding");
            Map::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>, BurrowError>> + Send {
        async move { Ok(self.values.lock().await.get(key).cloned()) }
    }

    fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<(), BurrowError>> + Send {
        async move {
            let mut values = self.values.lock().await;
            let previous = values.insert(key.to_string(), value);
            if let Err(err) = self.write(&values).await {
                tracing::error!(%err, key, "failed to persist datastore");
                match previous {
                    Some(previous) => values.insert(key.to_string(), previous),
                    None => values.remove(key),
                };
                return Err(err.into());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Helpers ────────────────────────────────────────────────────

    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            let dir = std::env::temp_dir().join(format!("burrow-store-{}", uuid::Uuid::new_v4()));
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn file(&self) -> PathBuf {
            self.0.join("cache").join("datastore.json")
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    // ── Tests ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn should_start_empty_when_file_missing() {
        let dir = TempDir::new();
        let store = JsonFileStore::open(dir.file()).await.unwrap();
        assert_eq!(store.get("alarm_enabled").await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_persist_values_across_reopen() {
        let dir = TempDir::new();
        let store = JsonFileStore::open(dir.file()).await.unwrap();
        store.set("alarm_enabled", Value::Bool(true)).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(dir.file()).await.unwrap();
        assert_eq!(
            reopened.get("alarm_enabled").await.unwrap(),
            Some(Value::Bool(true))
        );
        assert!(!dir.file().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn should_discard_invalid_json() {
        let dir = TempDir::new();
        std::fs::create_dir_all(dir.file().parent().unwrap()).unwrap();
        std::fs::write(dir.file(), b"{not json").unwrap();

        let store = JsonFileStore::open(dir.file()).await.unwrap();
        assert_eq!(store.get("alarm_enabled").await.unwrap(), None);

        store.set("alarm_enabled", Value::Bool(false)).await.unwrap();
        let raw: Value = serde_json::from_slice(&std::fs::read(dir.file()).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({ "alarm_enabled": false }));
    }

    #[tokio::test]
    async fn should_discard_non_object_json() {
        let dir = TempDir::new();
        std::fs::create_dir_all(dir.file().parent().unwrap()).unwrap();
        std::fs::write(dir.file(), b"[1, 2, 3]").unwrap();

        let store = JsonFileStore::open(dir.file()).await.unwrap();
        assert_eq!(store.get("0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_overwrite_existing_key() {
        let dir = TempDir::new();
        let store = JsonFileStore::open(dir.file()).await.unwrap();
        store.set("alarm_enabled", Value::Bool(true)).await.unwrap();
        store.set("alarm_enabled", Value::Bool(false)).await.unwrap();

        assert_eq!(
            store.get("alarm_enabled").await.unwrap(),
            Some(Value::Bool(false))
        );
    }

    #[tokio::test]
    async fn should_convert_into_storage_error() {
        let err: BurrowError = StorageError::Json(serde_json::from_str::<Value>("{").unwrap_err()).into();
        assert!(matches!(err, BurrowError::Storage(_)));
    }
}
