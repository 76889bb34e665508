use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};
use crate::persist::write_atomic;

/// A validated coordinate remembered for one normalized query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    #[serde(rename = "display", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Lower-cased, trimmed form of a query, used as the cache key.
pub fn cache_key(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Query-to-coordinate store shared across runs. Entries are never evicted.
pub trait GeocodeCache: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Stores `entry` unless the key is already present. Returns whether it
    /// was inserted.
    fn put(&self, key: &str, entry: CacheEntry) -> AppResult<bool>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<BTreeMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GeocodeCache for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: &str, entry: CacheEntry) -> AppResult<bool> {
        let mut entries = self.entries.lock();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), entry);
        Ok(true)
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// JSON file cache, loaded wholesale on open and rewritten on every insert.
pub struct JsonFileCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, CacheEntry>>,
}

impl JsonFileCache {
    pub fn open<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(AppError::Io(err)),
        };
        info!(path = %path.display(), entries = entries.len(), "geocode cache loaded");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }
}

impl GeocodeCache for JsonFileCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: &str, entry: CacheEntry) -> AppResult<bool> {
        let mut entries = self.entries.lock();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), entry);
        let serialized = serde_json::to_vec_pretty(&*entries)?;
        if let Err(err) = write_atomic(&self.path, &serialized) {
            entries.remove(key);
            return Err(err);
        }
        debug!(key, entries = entries.len(), "geocode cache persisted");
        Ok(true)
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(latitude: f64, longitude: f64) -> CacheEntry {
        CacheEntry {
            latitude,
            longitude,
            display_name: Some("Harare, Zimbabwe".into()),
        }
    }

    #[test]
    fn keys_are_trimmed_and_lowercased() {
        assert_eq!(cache_key("  Harare, Zimbabwe "), "harare, zimbabwe");
    }

    #[test]
    fn first_write_wins() {
        let cache = MemoryCache::new();
        assert!(cache.put("harare", entry(-17.8, 31.0)).unwrap());
        assert!(!cache.put("harare", entry(0.0, 0.0)).unwrap());
        assert_eq!(cache.get("harare").unwrap().latitude, -17.8);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn file_cache_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geocode_cache.json");
        {
            let cache = JsonFileCache::open(&path).unwrap();
            assert!(cache.is_empty());
            cache.put("harare, zimbabwe", entry(-17.82, 31.05)).unwrap();
        }

        let reopened = JsonFileCache::open(&path).unwrap();
        assert_eq!(reopened.get("harare, zimbabwe"), Some(entry(-17.82, 31.05)));
    }

    #[test]
    fn reads_files_written_without_display_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geocode_cache.json");
        fs::write(&path, r#"{"gweru, zimbabwe": {"lat": -19.45, "lon": 29.8167}}"#).unwrap();

        let cache = JsonFileCache::open(&path).unwrap();
        let hit = cache.get("gweru, zimbabwe").unwrap();
        assert_eq!(hit.longitude, 29.8167);
        assert!(hit.display_name.is_none());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geocode_cache.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(JsonFileCache::open(&path), Err(AppError::Json(_))));
    }
}
