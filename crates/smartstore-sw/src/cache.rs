//! Versioned cache stores.
//!
//! `CacheStorage` holds at most one committed `Cache` per generation name.
//! Install builds a cache off to the side and commits it whole, so a
//! half-populated store is never observable. Activation purges every store
//! whose name differs from the current version.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Name of a cache generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheVersion(String);

impl CacheVersion {
    /// Create a version from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The version name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheVersion {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A stored response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request path the entry was stored under.
    pub url: String,

    /// Response status.
    pub status: u16,

    /// Response content type.
    pub content_type: String,

    /// Response body.
    pub body: Vec<u8>,
}

/// One cache generation: exact-URL keyed entries.
#[derive(Debug, Clone)]
pub struct Cache {
    version: CacheVersion,
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create an empty cache for a generation.
    pub fn new(version: CacheVersion) -> Self {
        Self {
            version,
            entries: HashMap::new(),
        }
    }

    /// The generation this cache belongs to.
    pub fn version(&self) -> &CacheVersion {
        &self.version
    }

    /// Store an entry, keyed by its URL.
    pub fn put(&mut self, entry: CacheEntry) {
        debug!(version = %self.version, url = %entry.url, "cache put");
        self.entries.insert(entry.url.clone(), entry);
    }

    /// Exact-URL lookup.
    pub fn lookup(&self, url: &str) -> Option<&CacheEntry> {
        self.entries.get(url)
    }

    /// Whether an exact URL is stored.
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// All stored URLs.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All committed cache generations.
#[derive(Debug, Default)]
pub struct CacheStorage {
    stores: HashMap<CacheVersion, Cache>,
}

impl CacheStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a fully built cache, replacing any store with the same name.
    pub fn commit(&mut self, cache: Cache) {
        info!(version = %cache.version(), entries = cache.len(), "cache committed");
        self.stores.insert(cache.version().clone(), cache);
    }

    /// Whether a generation exists.
    pub fn has(&self, version: &CacheVersion) -> bool {
        self.stores.contains_key(version)
    }

    /// Get a committed generation.
    pub fn get(&self, version: &CacheVersion) -> Option<&Cache> {
        self.stores.get(version)
    }

    /// Delete a generation.
    pub fn delete(&mut self, version: &CacheVersion) -> bool {
        self.stores.remove(version).is_some()
    }

    /// Names of all committed generations.
    pub fn keys(&self) -> Vec<CacheVersion> {
        self.stores.keys().cloned().collect()
    }

    /// Delete every generation except `current`. Returns the purged names.
    pub fn purge_except(&mut self, current: &CacheVersion) -> Vec<CacheVersion> {
        let stale: Vec<CacheVersion> = self
            .stores
            .keys()
            .filter(|v| *v != current)
            .cloned()
            .collect();
        for version in &stale {
            self.stores.remove(version);
            info!(version = %version, "stale cache purged");
        }
        stale
    }

    /// Exact-URL lookup within one generation.
    pub fn lookup(&self, version: &CacheVersion, url: &str) -> Option<&CacheEntry> {
        self.stores.get(version)?.lookup(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str, body: &str) -> CacheEntry {
        CacheEntry {
            url: url.to_string(),
            status: 200,
            content_type: "text/html".to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_cache_put_lookup() {
        let mut cache = Cache::new(CacheVersion::new("smartstore-v1"));
        cache.put(entry("/dashboard", "<html>dash</html>"));

        assert!(cache.contains("/dashboard"));
        assert_eq!(
            cache.lookup("/dashboard").unwrap().body,
            b"<html>dash</html>".to_vec()
        );
        assert!(cache.lookup("/inventory").is_none());
    }

    #[test]
    fn test_lookup_is_exact() {
        let mut cache = Cache::new(CacheVersion::new("smartstore-v1"));
        cache.put(entry("/dashboard", "dash"));

        assert!(cache.lookup("/dashboard/").is_none());
        assert!(cache.lookup("/dash").is_none());
    }

    #[test]
    fn test_commit_replaces() {
        let mut storage = CacheStorage::new();
        let v1 = CacheVersion::new("smartstore-v1");

        let mut first = Cache::new(v1.clone());
        first.put(entry("/", "old"));
        storage.commit(first);

        let mut second = Cache::new(v1.clone());
        second.put(entry("/", "new"));
        second.put(entry("/offline", "offline"));
        storage.commit(second);

        let cache = storage.get(&v1).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup("/").unwrap().body, b"new".to_vec());
    }

    #[test]
    fn test_purge_except() {
        let mut storage = CacheStorage::new();
        let v1 = CacheVersion::new("smartstore-v1");
        let v2 = CacheVersion::new("smartstore-v2");
        storage.commit(Cache::new(v1.clone()));
        storage.commit(Cache::new(v2.clone()));

        let purged = storage.purge_except(&v2);

        assert_eq!(purged, vec![v1.clone()]);
        assert!(!storage.has(&v1));
        assert!(storage.has(&v2));
    }

    #[test]
    fn test_purge_keeps_only_current() {
        let mut storage = CacheStorage::new();
        for name in ["a", "b", "c"] {
            storage.commit(Cache::new(CacheVersion::new(name)));
        }

        let current = CacheVersion::new("b");
        let purged = storage.purge_except(&current);

        assert_eq!(purged.len(), 2);
        assert_eq!(storage.keys(), vec![current]);
    }
}
