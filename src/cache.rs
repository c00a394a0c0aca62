//! In-memory fetch cache shared by every request handler.
//!
//! Entries are written only after a successful upstream fetch and are checked
//! for freshness lazily on read. When a refresh fails, whatever entry exists
//! for the key is served instead, however old it is. Nothing is evicted except
//! through [`FetchCache::clear`] and [`FetchCache::remove`], so the map grows
//! for the lifetime of the process.

use std::{
    collections::HashMap,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

use crate::model::truthy;

const STATS_KEY_WIDTH: usize = 50;

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Arc<Value>,
    fetched_at: DateTime<Utc>,
    stored: Instant,
}

#[derive(Debug, Default)]
pub struct FetchCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_items: usize,
    pub items: Vec<CacheItemStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheItemStats {
    pub key: String,
    pub timestamp: String,
    pub age_seconds: u64,
    pub data_type: &'static str,
    pub has_data: bool,
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the payload cached under `key` when it is younger than
    /// `max_age`; otherwise runs `loader` and stores its result. A failing
    /// loader falls back to the previous payload if there is one.
    ///
    /// The lock is never held while the loader runs, so two concurrent misses
    /// on the same key may both load; the last write wins.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: &str,
        max_age: Duration,
        loader: F,
    ) -> Result<Arc<Value>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: std::fmt::Display,
    {
        let cached = self.entries.read().get(key).cloned();
        if let Some(entry) = &cached {
            if entry.stored.elapsed() < max_age {
                tracing::debug!(key, "cache hit");
                return Ok(entry.payload.clone());
            }
        }

        tracing::debug!(key, "cache miss");
        match loader().await {
            Ok(payload) => {
                let payload = Arc::new(payload);
                self.entries.write().insert(
                    key.to_owned(),
                    CacheEntry {
                        payload: payload.clone(),
                        fetched_at: Utc::now(),
                        stored: Instant::now(),
                    },
                );
                Ok(payload)
            }
            Err(err) => match cached {
                Some(entry) => {
                    tracing::warn!(
                        key,
                        error = %err,
                        age_secs = entry.stored.elapsed().as_secs(),
                        "refresh failed, serving stale cache entry"
                    );
                    Ok(entry.payload)
                }
                None => Err(err),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every entry and reports how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        let mut items: Vec<CacheItemStats> = entries
            .iter()
            .map(|(key, entry)| CacheItemStats {
                key: truncate_key(key),
                timestamp: entry
                    .fetched_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                age_seconds: entry.stored.elapsed().as_secs(),
                data_type: json_type(&entry.payload),
                has_data: truthy(&entry.payload),
            })
            .collect();
        items.sort_by(|a, b| a.key.cmp(&b.key));
        CacheStats {
            total_items: entries.len(),
            items,
        }
    }
}

fn truncate_key(key: &str) -> String {
    if key.chars().count() > STATS_KEY_WIDTH {
        let head: String = key.chars().take(STATS_KEY_WIDTH).collect();
        format!("{head}...")
    } else {
        key.to_owned()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
