//! One small cache abstraction with two users: the file-tree cache (5 min,
//! keyed by project root) and the content cache (7 days, keyed by relative
//! path + source mtime so any file modification invalidates prior entries).

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;

use crate::limits::{parse_secs, DEFAULT_CONTENT_MAX_AGE};

pub fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Modification time of `path` in unix milliseconds, 0 when unavailable.
pub fn file_mtime_ms(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

struct Entry<V> {
    created_ms: u64,
    value: V,
}

/// In-memory map with a fixed TTL measured from entry creation, not access.
/// Expired entries are evicted on lookup.
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, unix_ms_now())
    }

    pub fn put(&self, key: &str, value: V) {
        self.put_at(key, value, unix_ms_now());
    }

    pub(crate) fn get_at(&self, key: &str, now_ms: u64) -> Option<V> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        let ttl_ms = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);
        let expired = match entries.get(key) {
            Some(entry) => now_ms.saturating_sub(entry.created_ms) > ttl_ms,
            None => return None,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub(crate) fn put_at(&self, key: &str, value: V, now_ms: u64) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                created_ms: now_ms,
                value,
            },
        );
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct CacheEnvelope {
    created_ms: u64,
    content: String,
}

/// Content-addressed cache of extracted file text.
///
/// Keys combine the relative path, a load variant, and the source file's
/// mtime, so a changed mtime produces a different key and stale content is
/// never served. Entries also expire after a maximum age even when the
/// source file is untouched. Optionally spills to a cache directory so
/// entries survive across processes.
pub struct ContentCache {
    mem: TtlCache<String>,
    dir: Option<PathBuf>,
    max_age: Duration,
}

impl ContentCache {
    pub fn new(dir: Option<PathBuf>) -> Self {
        let max_age = parse_secs(
            std::env::var("NOTEFLOW_CONTENT_MAX_AGE_SECS").ok().as_deref(),
            DEFAULT_CONTENT_MAX_AGE,
        );
        Self::with_max_age(dir, max_age)
    }

    pub fn with_max_age(dir: Option<PathBuf>, max_age: Duration) -> Self {
        Self {
            mem: TtlCache::new(max_age),
            dir,
            max_age,
        }
    }

    /// Composite key for one load of one file. `variant` distinguishes full
    /// reads, head reads, and per-keyword-set grep extracts of the same path.
    pub fn key(rel_path: &str, variant: &str, mtime_ms: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(rel_path.as_bytes());
        hasher.update(b"|");
        hasher.update(variant.as_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(32);
        for byte in &digest[..8] {
            hex.push_str(&format!("{byte:02x}"));
        }
        format!("{hex}-{mtime_ms}")
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, unix_ms_now()).await
    }

    pub async fn put(&self, key: &str, content: &str) {
        let now_ms = unix_ms_now();
        self.mem.put_at(key, content.to_string(), now_ms);
        if let Err(err) = self.persist(key, content, now_ms).await {
            log::warn!("Content cache write failed for {key}: {err}");
        }
    }

    pub(crate) async fn get_at(&self, key: &str, now_ms: u64) -> Option<String> {
        if let Some(content) = self.mem.get_at(key, now_ms) {
            return Some(content);
        }

        let dir = self.dir.as_ref()?;
        let path = dir.join(format!("{key}.json"));
        let bytes = fs::read(&path).await.ok()?;
        let envelope: CacheEnvelope = match serde_json::from_slice(&bytes) {
            Ok(env) => env,
            Err(err) => {
                log::warn!("Content cache corrupted {}: {err}", path.display());
                let _ = fs::remove_file(&path).await;
                return None;
            }
        };

        let max_age_ms = u64::try_from(self.max_age.as_millis()).unwrap_or(u64::MAX);
        if now_ms.saturating_sub(envelope.created_ms) > max_age_ms {
            // Aged out; treat as a miss so the content is recomputed.
            let _ = fs::remove_file(&path).await;
            return None;
        }

        self.mem.put_at(key, envelope.content.clone(), envelope.created_ms);
        Some(envelope.content)
    }

    async fn persist(&self, key: &str, content: &str, now_ms: u64) -> Result<()> {
        let Some(dir) = self.dir.as_ref() else {
            return Ok(());
        };
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("create cache dir {}", dir.display()))?;
        let envelope = CacheEnvelope {
            created_ms: now_ms,
            content: content.to_string(),
        };
        let path = dir.join(format!("{key}.json"));
        fs::write(&path, serde_json::to_vec(&envelope)?)
            .await
            .with_context(|| format!("write cache entry {}", path.display()))?;
        Ok(())
    }
}
