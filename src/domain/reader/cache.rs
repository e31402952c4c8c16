use super::error::CacheError;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

const INDEX_FILE: &str = "index.json";
const BLOB_EXTENSION: &str = "bin";
const MAX_AGE_DAYS_CAP: u64 = 36_500;

/// What a cache entry points at
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Bytes { content_type: String, data: Bytes },
    /// Remote audio that can be fetched again through the relay proxy
    Url(String),
}

impl CacheValue {
    pub fn size(&self) -> u64 {
        match self {
            CacheValue::Bytes { data, .. } => data.len() as u64,
            CacheValue::Url(url) => url.len() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub value: CacheValue,
    pub created_at: DateTime<Utc>,
    pub size: u64,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: CacheValue, created_at: DateTime<Utc>) -> Self {
        let size = value.size();
        Self {
            key: key.into(),
            value,
            created_at,
            size,
        }
    }

    fn meta(&self) -> EntryMeta {
        EntryMeta {
            key: self.key.clone(),
            created_at: self.created_at,
            size: self.size,
            content_type: match &self.value {
                CacheValue::Bytes { content_type, .. } => Some(content_type.clone()),
                CacheValue::Url(_) => None,
            },
            url: match &self.value {
                CacheValue::Url(url) => Some(url.clone()),
                CacheValue::Bytes { .. } => None,
            },
        }
    }
}

/// Entry metadata without the audio payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Age and size bounds enforced by every eviction sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheLimits {
    pub max_age: Duration,
    pub max_size_bytes: u64,
}

impl CacheLimits {
    pub fn new(max_age_days: u64, max_size_mb: u64) -> Self {
        Self {
            max_age: Duration::days(max_age_days.min(MAX_AGE_DAYS_CAP) as i64),
            max_size_bytes: max_size_mb.saturating_mul(1024 * 1024),
        }
    }
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self::new(7, 100)
    }
}

/// Persistence behind the local cache
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Insert `entry`. An existing entry under the same key is left untouched.
    async fn save(&self, entry: CacheEntry) -> Result<(), CacheError>;

    async fn entries(&self) -> Result<Vec<EntryMeta>, CacheError>;

    async fn remove_many(&self, keys: &[String]) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;
}

/// Content-addressed audio cache with age and size bounded eviction
pub struct LocalCache {
    store: std::sync::Arc<dyn CacheStore>,
    limits: CacheLimits,
}

impl LocalCache {
    pub fn new(store: std::sync::Arc<dyn CacheStore>, limits: CacheLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let entry = self.store.load(key).await?;
        tracing::debug!(key = %key, hit = entry.is_some(), "Audio cache lookup");
        Ok(entry)
    }

    /// Store `value` under `key`, then run an eviction sweep
    pub async fn put(&self, key: &str, value: CacheValue) -> Result<(), CacheError> {
        self.put_at(key, value, Utc::now()).await
    }

    pub async fn put_at(
        &self,
        key: &str,
        value: CacheValue,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        self.store.save(CacheEntry::new(key, value, now)).await?;
        self.evict_at(now).await?;
        Ok(())
    }

    pub async fn evict(&self) -> Result<Vec<String>, CacheError> {
        self.evict_at(Utc::now()).await
    }

    /// Delete expired entries and whatever does not fit under the size cap,
    /// newest entries being kept first. Returns the evicted keys.
    pub async fn evict_at(&self, now: DateTime<Utc>) -> Result<Vec<String>, CacheError> {
        let entries = self.store.entries().await?;
        let evicted = select_evictions(entries, &self.limits, now);

        if !evicted.is_empty() {
            self.store.remove_many(&evicted).await?;
            tracing::info!(evicted = evicted.len(), "Audio cache entries evicted");
        }
        Ok(evicted)
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.store.clear().await?;
        tracing::info!("Audio cache cleared");
        Ok(())
    }
}

fn select_evictions(
    mut entries: Vec<EntryMeta>,
    limits: &CacheLimits,
    now: DateTime<Utc>,
) -> Vec<String> {
    entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.key.cmp(&b.key))
    });

    let mut kept_size: u64 = 0;
    let mut evicted = Vec::new();
    for entry in entries {
        let expired = now - entry.created_at > limits.max_age;
        let over_cap = kept_size.saturating_add(entry.size) > limits.max_size_bytes;
        if expired || over_cap {
            evicted.push(entry.key);
        } else {
            kept_size += entry.size;
        }
    }
    evicted
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn save(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries
            .lock()
            .entry(entry.key.clone())
            .or_insert(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<EntryMeta>, CacheError> {
        Ok(self.entries.lock().values().map(|e| e.meta()).collect())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.lock().clear();
        Ok(())
    }
}

/// Directory-backed store: `index.json` holds every entry's metadata and
/// audio bytes live in one blob file per entry.
pub struct DiskStore {
    dir: PathBuf,
    index: tokio::sync::Mutex<Option<HashMap<String, EntryMeta>>>,
}

impl DiskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            index: tokio::sync::Mutex::new(None),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", blob_file_stem(key), BLOB_EXTENSION))
    }

    async fn read_index(&self) -> Result<HashMap<String, EntryMeta>, CacheError> {
        match tokio::fs::read(self.index_path()).await {
            Ok(raw) => {
                let entries: Vec<EntryMeta> = serde_json::from_slice(&raw)?;
                Ok(entries.into_iter().map(|e| (e.key.clone(), e)).collect())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_index(&self, index: &HashMap<String, EntryMeta>) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let entries: Vec<&EntryMeta> = index.values().collect();
        let raw = serde_json::to_vec_pretty(&entries)?;

        // Write then rename so a crash never leaves a torn index
        let tmp = self.dir.join(format!("{}.tmp", INDEX_FILE));
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, self.index_path()).await?;
        Ok(())
    }

    async fn remove_blob(&self, key: &str) -> Result<(), CacheError> {
        match tokio::fs::remove_file(self.blob_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keys are hash strings; anything outside `[A-Za-z0-9_-]` is hex escaped
fn blob_file_stem(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_string()
            } else {
                format!("%{:x}", c as u32)
            }
        })
        .collect()
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let mut guard = self.index.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_index().await?);
        }
        let meta = match guard.as_ref().and_then(|index| index.get(key)) {
            Some(meta) => meta.clone(),
            None => return Ok(None),
        };

        let value = match (meta.url.clone(), meta.content_type.clone()) {
            (Some(url), _) => CacheValue::Url(url),
            (None, content_type) => match tokio::fs::read(self.blob_path(key)).await {
                Ok(data) => CacheValue::Bytes {
                    content_type: content_type.unwrap_or_else(|| "audio/mpeg".to_string()),
                    data: Bytes::from(data),
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // Blob vanished underneath us, forget the entry
                    tracing::warn!(key = %key, "Cached audio blob missing");
                    if let Some(index) = guard.as_mut() {
                        index.remove(key);
                        self.write_index(index).await?;
                    }
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            },
        };

        Ok(Some(CacheEntry {
            key: meta.key,
            value,
            created_at: meta.created_at,
            size: meta.size,
        }))
    }

    async fn save(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let mut guard = self.index.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_index().await?);
        }
        let Some(index) = guard.as_mut() else {
            return Ok(());
        };
        if index.contains_key(&entry.key) {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        if let CacheValue::Bytes { data, .. } = &entry.value {
            tokio::fs::write(self.blob_path(&entry.key), data).await?;
        }
        index.insert(entry.key.clone(), entry.meta());
        self.write_index(index).await
    }

    async fn entries(&self) -> Result<Vec<EntryMeta>, CacheError> {
        let mut guard = self.index.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_index().await?);
        }
        Ok(guard
            .as_ref()
            .map(|index| index.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_many(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut guard = self.index.lock().await;
        if guard.is_none() {
            *guard = Some(self.read_index().await?);
        }
        let Some(index) = guard.as_mut() else {
            return Ok(());
        };

        for key in keys {
            if index.remove(key).is_some() {
                self.remove_blob(key).await?;
            }
        }
        self.write_index(index).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut guard = self.index.lock().await;
        let index = match guard.take() {
            Some(index) => index,
            None => self.read_index().await?,
        };

        for key in index.keys() {
            self.remove_blob(key).await?;
        }
        *guard = Some(HashMap::new());
        self.write_index(&HashMap::new()).await
    }
}
