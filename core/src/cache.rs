//! Soft TTL cache over the key-value store.
//!
//! Values are wrapped in a timestamped [`CacheItem`] envelope. A read past
//! the expiration timestamp counts as a miss and evicts the slot. Writes are
//! best-effort: a failed write is logged and swallowed, and callers must
//! tolerate the resulting miss; this is never a system of record.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::storage::Storage;

const CACHE_PREFIX: &str = "cache:";

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheItem<T> {
    pub payload: T,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

fn cache_key(key: &str) -> String {
    format!("{CACHE_PREFIX}{key}")
}

pub fn put<T: Serialize>(
    storage: &Storage,
    key: &str,
    value: &T,
    ttl: Duration,
    now: DateTime<Utc>,
) {
    let item = CacheItem {
        payload: value,
        created_at: now,
        expires_at: now + ttl,
    };
    let result = serde_json::to_string(&item)
        .map_err(anyhow::Error::from)
        .and_then(|json| storage.kv_set(&cache_key(key), &json));
    if let Err(e) = result {
        tracing::warn!("cache write for '{key}' failed: {e:#}");
    }
}

/// Returns the cached payload if present and unexpired. An expired or
/// undecodable entry is evicted and reported as absent.
pub fn get<T: DeserializeOwned>(storage: &Storage, key: &str, now: DateTime<Utc>) -> Option<T> {
    let full_key = cache_key(key);
    let json = match storage.kv_get(&full_key) {
        Ok(Some(json)) => json,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!("cache read for '{key}' failed: {e:#}");
            return None;
        }
    };

    match serde_json::from_str::<CacheItem<T>>(&json) {
        Ok(item) if now < item.expires_at => Some(item.payload),
        Ok(_) => {
            evict(storage, &full_key, key);
            None
        }
        Err(e) => {
            tracing::debug!("cache entry '{key}' is undecodable, evicting: {e}");
            evict(storage, &full_key, key);
            None
        }
    }
}

fn evict(storage: &Storage, full_key: &str, key: &str) {
    if let Err(e) = storage.kv_delete(full_key) {
        tracing::warn!("cache eviction for '{key}' failed: {e:#}");
    }
}
