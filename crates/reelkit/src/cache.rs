//! Key/value caches with TTL expiry.
//!
//! The pipeline works without a cache. [`crate::Scraper::with_cache`] uses one
//! to skip refetching page results that were seen recently.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Result;

#[async_trait]
pub trait Cache: Send + Sync {
    /// Value stored under `key`, unless it has expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Drop every expired entry and return how many were removed.
    async fn delete_expired(&self) -> Result<usize>;
}

/// Deserialize the JSON value cached under `key`. Undecodable entries read as absent.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Result<Option<T>> {
    let Some(raw) = cache.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            debug!(key, error = %e, "ignoring undecodable cache entry");
            Ok(None)
        }
    }
}

pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<()> {
    cache.set(key, serde_json::to_string(value)?, ttl).await
}

#[derive(Clone)]
struct CacheEntry {
    value: String,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

/// Process-local cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(entry) = self.entries.get(key)
            && !entry.is_expired()
        {
            return Ok(Some(entry.value.clone()));
        }
        // Only drop the entry if it is still the expired one.
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    async fn delete_expired(&self) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        Ok(before.saturating_sub(self.entries.len()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl FileEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

type FileEntries = FxHashMap<String, FileEntry>;

/// Cache persisted as a single JSON document, for front ends that run once per
/// invocation.
pub struct FileCache {
    path: PathBuf,
    entries: Mutex<Option<FileEntries>>,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    async fn load(&self) -> Result<FileEntries> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "discarding corrupt cache file");
                    Ok(FileEntries::default())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileEntries::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, entries: &FileEntries) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Cache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        let entries = guard.get_or_insert_with(FileEntries::default);
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired(Utc::now()))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        let entries = guard.get_or_insert_with(FileEntries::default);
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        entries.insert(key.to_string(), FileEntry { value, expires_at });
        self.persist(entries).await
    }

    async fn delete_expired(&self) -> Result<usize> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        let entries = guard.get_or_insert_with(FileEntries::default);
        let now = Utc::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            self.persist(entries).await?;
        }
        Ok(removed)
    }
}
