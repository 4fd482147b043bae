//! Content-addressable, TTL-based file cache for provider responses.
//!
//! Each entry is one JSON file named by the SHA-256 of the canonicalized
//! request parameters, containing `{key, createdAt, value}`. Reads treat
//! malformed content as a miss. Writes go through a temp file and rename so
//! a concurrent reader never observes a partial entry; concurrent writers to
//! the same key are last-write-wins, which is acceptable because the value
//! is deterministic given the key.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::config;

/// Default cache directory: `~/.practice-harness/cache/practice`.
pub fn default_cache_dir() -> PathBuf {
    config::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".practice-harness")
        .join("cache")
        .join("practice")
}

/// Resolve the cache directory from configuration: absolute paths pass
/// through, relative paths anchor at the config file, absence falls back to
/// the default directory.
pub fn resolve_cache_dir(configured: Option<&str>, config_path: &Path) -> PathBuf {
    match configured {
        Some(dir) if !dir.trim().is_empty() => config::resolve_relative(dir, config_path),
        _ => default_cache_dir(),
    }
}

/// Canonical JSON rendering: object keys sorted, no insignificant whitespace.
/// Cache keys must not depend on map iteration order.
pub fn stable_stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(stable_stringify).collect();
            format!("[{}]", parts.join(","))
        }
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::Value::String((*k).clone()),
                        stable_stringify(&map[*k])
                    )
                })
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        other => other.to_string(),
    }
}

/// Derive the cache key for a request payload.
pub fn create_cache_key(payload: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_stringify(payload).as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheFile {
    key: String,
    created_at: String,
    value: Vec<crate::models::ProviderRow>,
}

fn cache_path(cache_dir: &Path, key: &str) -> PathBuf {
    cache_dir.join(format!("{}.json", key))
}

/// File-backed cache store rooted at one directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read a non-expired entry. Missing files, malformed JSON, and entries
    /// older than `ttl_ms` all read as `None`.
    pub fn read(&self, key: &str, ttl_ms: u64) -> Option<Vec<crate::models::ProviderRow>> {
        let path = cache_path(&self.dir, key);
        let text = std::fs::read_to_string(path).ok()?;
        let payload: CacheFile = serde_json::from_str(&text).ok()?;
        let created_at: DateTime<Utc> = payload.created_at.parse().ok()?;

        let age_ms = (Utc::now() - created_at).num_milliseconds();
        if ttl_ms > 0 && age_ms > ttl_ms as i64 {
            return None;
        }
        Some(payload.value)
    }

    /// Write an entry via temp-file-then-rename.
    pub fn write(&self, key: &str, value: &[crate::models::ProviderRow]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory: {}", self.dir.display()))?;

        let payload = CacheFile {
            key: key.to_string(),
            created_at: Utc::now().to_rfc3339(),
            value: value.to_vec(),
        };
        let body = format!("{}\n", serde_json::to_string_pretty(&payload)?);

        let final_path = cache_path(&self.dir, key);
        let tmp_path = self.dir.join(format!(".{}.tmp", key));
        std::fs::write(&tmp_path, body)
            .with_context(|| format!("Failed to write cache entry: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &final_path)
            .with_context(|| format!("Failed to commit cache entry: {}", final_path.display()))?;
        Ok(())
    }

    /// List entries newest-first with size and age metadata.
    pub fn list(&self) -> CacheListing {
        if !self.dir.exists() {
            return CacheListing {
                cache_dir: self.dir.clone(),
                exists: false,
                entries: Vec::new(),
            };
        }

        let mut entries = Vec::new();
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(_) => {
                return CacheListing {
                    cache_dir: self.dir.clone(),
                    exists: false,
                    entries: Vec::new(),
                }
            }
        };

        let now = Utc::now();
        for dir_entry in read_dir.flatten() {
            let path = dir_entry.path();
            let file_name = dir_entry.file_name().to_string_lossy().to_string();
            if !file_name.ends_with(".json") {
                continue;
            }
            let size_bytes = dir_entry.metadata().map(|m| m.len()).unwrap_or(0);

            let created_at = std::fs::read_to_string(&path)
                .ok()
                .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
                .and_then(|v| v.get("createdAt").and_then(|c| c.as_str()).map(String::from));
            let key = file_name.trim_end_matches(".json").to_string();
            let age_ms = created_at
                .as_deref()
                .and_then(|c| c.parse::<DateTime<Utc>>().ok())
                .map(|ts| (now - ts).num_milliseconds().max(0) as u64);

            entries.push(CacheEntryInfo {
                file_name,
                key,
                path,
                size_bytes,
                created_at,
                age_ms,
            });
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        CacheListing {
            cache_dir: self.dir.clone(),
            exists: true,
            entries,
        }
    }

    /// Aggregate statistics over the listing.
    pub fn stats(&self) -> CacheStats {
        let listing = self.list();
        let total_size_bytes = listing.entries.iter().map(|e| e.size_bytes).sum();
        CacheStats {
            cache_dir: listing.cache_dir.display().to_string(),
            exists: listing.exists,
            file_count: listing.entries.len(),
            total_size_bytes,
            oldest_created_at: listing.entries.last().and_then(|e| e.created_at.clone()),
            newest_created_at: listing.entries.first().and_then(|e| e.created_at.clone()),
        }
    }

    /// Remove entries. With `older_than_ms` set, entries younger than the
    /// threshold are kept, as are entries whose age is unknown; without a
    /// threshold, everything goes. `dry_run` reports without deleting.
    pub fn clean(&self, older_than_ms: Option<u64>, dry_run: bool) -> CleanOutcome {
        let listing = self.list();
        if !listing.exists {
            return CleanOutcome {
                cache_dir: listing.cache_dir.display().to_string(),
                scanned_count: 0,
                removed_count: 0,
                kept_count: 0,
                freed_bytes: 0,
                dry_run,
            };
        }

        let mut removed_count = 0;
        let mut kept_count = 0;
        let mut freed_bytes = 0;

        for entry in &listing.entries {
            let keep = match older_than_ms {
                Some(threshold) if threshold > 0 => {
                    entry.age_ms.map(|age| age < threshold).unwrap_or(true)
                }
                _ => false,
            };

            if keep {
                kept_count += 1;
                continue;
            }
            if !dry_run {
                let _ = std::fs::remove_file(&entry.path);
            }
            removed_count += 1;
            freed_bytes += entry.size_bytes;
        }

        CleanOutcome {
            cache_dir: listing.cache_dir.display().to_string(),
            scanned_count: listing.entries.len(),
            removed_count,
            kept_count,
            freed_bytes,
            dry_run,
        }
    }
}

/// One entry in a cache listing.
#[derive(Debug, Clone)]
pub struct CacheEntryInfo {
    pub file_name: String,
    pub key: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: Option<String>,
    pub age_ms: Option<u64>,
}

/// The cache directory's contents, newest entries first.
#[derive(Debug)]
pub struct CacheListing {
    pub cache_dir: PathBuf,
    pub exists: bool,
    pub entries: Vec<CacheEntryInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub cache_dir: String,
    pub exists: bool,
    pub file_count: usize,
    pub total_size_bytes: u64,
    pub oldest_created_at: Option<String>,
    pub newest_created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanOutcome {
    pub cache_dir: String,
    pub scanned_count: usize,
    pub removed_count: usize,
    pub kept_count: usize,
    pub freed_bytes: u64,
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderRow;
    use tempfile::TempDir;

    fn row(url: &str) -> ProviderRow {
        ProviderRow {
            title: "A result".to_string(),
            url: url.to_string(),
            snippet: "snippet".to_string(),
            provider: "hn".to_string(),
            published_at: None,
            engagement: serde_json::json!({ "points": 12 }),
            domain: "example.com".to_string(),
        }
    }

    #[test]
    fn stable_stringify_sorts_object_keys() {
        let a = serde_json::json!({ "b": 1, "a": [1, 2], "c": { "z": null, "y": "s" } });
        assert_eq!(
            stable_stringify(&a),
            r#"{"a":[1,2],"b":1,"c":{"y":"s","z":null}}"#
        );
    }

    #[test]
    fn cache_key_is_stable_across_key_order() {
        let a = serde_json::json!({ "provider": "hn", "query": "q", "maxResults": 4 });
        let b = serde_json::json!({ "maxResults": 4, "query": "q", "provider": "hn" });
        assert_eq!(create_cache_key(&a), create_cache_key(&b));
    }

    #[test]
    fn round_trip_before_ttl() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().to_path_buf());

        let rows = vec![row("https://example.com/a"), row("https://example.com/b")];
        store.write("abc123", &rows).unwrap();

        let read = store.read("abc123", 60_000).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].url, "https://example.com/a");
        assert_eq!(read[1].engagement, serde_json::json!({ "points": 12 }));
    }

    #[test]
    fn expired_entry_reads_as_none() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().to_path_buf());

        // Write an entry with a createdAt far in the past.
        let stale = serde_json::json!({
            "key": "old",
            "createdAt": "2000-01-01T00:00:00Z",
            "value": []
        });
        std::fs::write(tmp.path().join("old.json"), stale.to_string()).unwrap();

        assert!(store.read("old", 1000).is_none());
        // ttl_ms == 0 disables expiry.
        assert!(store.read("old", 0).is_some());
    }

    #[test]
    fn malformed_entry_reads_as_miss() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().to_path_buf());
        std::fs::write(tmp.path().join("bad.json"), "{ nope").unwrap();
        assert!(store.read("bad", 60_000).is_none());
    }

    #[test]
    fn stats_and_clean_report_counts() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().to_path_buf());
        store.write("k1", &[row("https://a")]).unwrap();
        store.write("k2", &[row("https://b")]).unwrap();

        let stats = store.stats();
        assert!(stats.exists);
        assert_eq!(stats.file_count, 2);
        assert!(stats.total_size_bytes > 0);

        // Dry run removes nothing.
        let outcome = store.clean(None, true);
        assert_eq!(outcome.scanned_count, 2);
        assert_eq!(outcome.removed_count, 2);
        assert_eq!(store.stats().file_count, 2);

        // Young entries are kept under an age threshold.
        let outcome = store.clean(Some(60_000), false);
        assert_eq!(outcome.kept_count, 2);
        assert_eq!(outcome.removed_count, 0);

        // No threshold removes everything.
        let outcome = store.clean(None, false);
        assert_eq!(outcome.removed_count, 2);
        assert_eq!(store.stats().file_count, 0);
    }

    #[test]
    fn clean_on_missing_dir_is_a_noop() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("nope"));
        let outcome = store.clean(None, false);
        assert_eq!(outcome.scanned_count, 0);
        assert!(!store.stats().exists);
    }
}
