//! Key-value store port: durable scalar state surviving restarts.

use std::future::Future;

use burrow_domain::error::BurrowError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Durable JSON key-value store.
///
/// Writes replace the whole value atomically.
pub trait KeyValueStore {
    /// Read the raw value stored under `key`.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<serde_json::Value>, BurrowError>> + Send;

    /// Store `value` under `key`.
    fn set(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> impl Future<Output = Result<(), BurrowError>> + Send;
}

/// Read `key` as a `T`, falling back to `default` when the key is missing
/// or holds a value of another shape.
///
/// # Errors
///
/// Returns the store's error if reading fails.
pub async fn get_or<S, T>(store: &S, key: &str, default: T) -> Result<T, BurrowError>
where
    S: KeyValueStore + Sync,
    T: DeserializeOwned,
{
    let Some(raw) = store.get(key).await? else {
        return Ok(default);
    };
    match serde_json::from_value(raw) {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::warn!(%err, key, "ignoring stored value of unexpected type");
            Ok(default)
        }
    }
}

/// Store a serializable value under `key`.
///
/// # Errors
///
/// Returns [`BurrowError::Storage`] if the value cannot be serialized, or
/// the store's error if writing fails.
pub async fn put<S, T>(store: &S, key: &str, value: &T) -> Result<(), BurrowError>
where
    S: KeyValueStore + Sync,
    T: Serialize + Sync,
{
    let raw = serde_json::to_value(value).map_err(|err| BurrowError::Storage(Box::new(err)))?;
    store.set(key, raw).await
}

impl<T: KeyValueStore + Send + Sync> KeyValueStore for std::sync::Arc<T> {
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<serde_json::Value>, BurrowError>> + Send {
        (**self).get(key)
    }

    fn set(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> impl Future<Output = Result<(), BurrowError>> + Send {
        (**self).set(key, value)
    }
}
