//! Per-identity registry response cache.
//!
//! The cache always works in memory for the duration of a run. When given a
//! path it is also loaded from and persisted to a JSON file, and entries
//! older than the TTL are ignored.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Enrichment, PackageRecord};
use crate::parser::types::PackageId;

const CACHE_FORMAT_VERSION: u32 = 1;

/// Errors raised when loading or saving the cache file.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to access cache file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to encode cache file: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A cached lookup outcome. Transient failures are never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CachedLookup {
    Found { record: PackageRecord },
    Missing { reason: String },
}

impl CachedLookup {
    /// False for a found record that was stored without advisory data.
    pub fn has_advisories(&self) -> bool {
        match self {
            CachedLookup::Found { record } => record.advisories_checked,
            CachedLookup::Missing { .. } => true,
        }
    }

    pub fn into_enrichment(self) -> Enrichment {
        match self {
            CachedLookup::Found { record } => Enrichment::Known(record),
            CachedLookup::Missing { reason } => Enrichment::Unknown { reason },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    stored_at: DateTime<Utc>,
    value: CachedLookup,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    package: PackageId,
    stored_at: DateTime<Utc>,
    value: CachedLookup,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: Vec<PersistedEntry>,
}

/// Hit/miss counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Thread-safe cache of registry lookups keyed by package identity.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<PackageId, CacheEntry>,
    path: Option<PathBuf>,
    ttl: Option<ChronoDuration>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ResponseCache {
    /// A fresh cache that lives only for this run.
    pub fn in_memory() -> Self {
        Self {
            entries: DashMap::new(),
            path: None,
            ttl: None,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// A cache backed by `path`, pre-loaded with any entries still within `ttl`.
    ///
    /// A missing file starts an empty cache. A corrupt file is logged and
    /// ignored, and is overwritten on the next [`persist`](Self::persist).
    pub fn persistent(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        let path = path.into();
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::weeks(52 * 100));
        let cache = Self {
            path: Some(path.clone()),
            ttl: Some(ttl),
            ..Self::in_memory()
        };

        match Self::load(&path) {
            Ok(Some(file)) => {
                let now = Utc::now();
                for entry in file.entries {
                    if now - entry.stored_at <= ttl {
                        cache.entries.insert(
                            entry.package,
                            CacheEntry {
                                stored_at: entry.stored_at,
                                value: entry.value,
                            },
                        );
                    }
                }
                tracing::debug!(path = %path.display(), entries = cache.entries.len(), "loaded registry cache");
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable registry cache");
            }
        }
        cache
    }

    fn load(path: &Path) -> Result<Option<CacheFile>, CacheError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: CacheFile = serde_json::from_str(&content)?;
        if file.version != CACHE_FORMAT_VERSION {
            return Ok(None);
        }
        Ok(Some(file))
    }

    /// Returns the cached outcome for `id`, if present and fresh.
    pub fn get(&self, id: &PackageId) -> Option<CachedLookup> {
        let fresh = self.entries.get(id).and_then(|entry| match self.ttl {
            Some(ttl) if Utc::now() - entry.stored_at > ttl => None,
            _ => Some(entry.value.clone()),
        });
        match fresh {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        fresh
    }

    /// Stores an outcome; concurrent inserts for one identity keep the last write.
    pub fn insert(&self, id: PackageId, value: CachedLookup) {
        self.entries.insert(
            id,
            CacheEntry {
                stored_at: Utc::now(),
                value,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Writes the cache to its backing file, if it has one.
    ///
    /// The file is written to a sibling temporary file first and renamed
    /// into place.
    pub fn persist(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut entries: Vec<PersistedEntry> = self
            .entries
            .iter()
            .map(|entry| PersistedEntry {
                package: entry.key().clone(),
                stored_at: entry.value().stored_at,
                value: entry.value().value.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.package.cmp(&b.package));

        let file = CacheFile {
            version: CACHE_FORMAT_VERSION,
            entries,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&file)?)?;
        fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), entries = file.entries.len(), "persisted registry cache");
        Ok(())
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::in_memory()
    }
}
