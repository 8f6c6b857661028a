//! Shared media cache - warmed assets ready for instant display.
//!
//! Written only by the preloader, read by the renderer. The engine never
//! looks inside; it only sees preload outcomes. Bounded by entry count with
//! LRU eviction (reads refresh recency).

use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::entities::MediaKind;

/// Default number of warmed assets kept
pub const DEFAULT_CACHE_ENTRIES: usize = 32;

/// Decoded/fetched asset, cheap to clone
#[derive(Clone, Debug)]
pub struct WarmMedia {
    pub url: String,
    pub kind: MediaKind,
    pub bytes: Arc<[u8]>,
}

impl WarmMedia {
    pub fn new(url: &str, kind: MediaKind, bytes: Vec<u8>) -> Self {
        Self {
            url: url.to_string(),
            kind,
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }
}

#[derive(Debug)]
pub struct MediaCache {
    entries: Mutex<LruCache<String, WarmMedia>>,
    stats: CacheStats,
}

impl Default for MediaCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_ENTRIES)
    }
}

impl MediaCache {
    /// Create cache holding at most `capacity` assets (min 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        debug!("MediaCache created: capacity={}", capacity);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            stats: CacheStats::default(),
        }
    }

    /// Get warmed asset, refreshing its recency
    pub fn get(&self, url: &str) -> Option<WarmMedia> {
        let hit = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned();
        if hit.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        hit
    }

    /// Check presence without touching recency or stats
    pub fn contains(&self, url: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(url)
    }

    pub fn insert(&self, media: WarmMedia) {
        let size = media.size();
        let url = media.url.clone();
        let evicted = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.clone(), media);
        if let Some((old_url, _)) = evicted.filter(|(k, _)| *k != url) {
            debug!("MediaCache evicted {}", old_url);
        }
        debug!("MediaCache stored {} ({} bytes)", url, size);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warm(url: &str) -> WarmMedia {
        WarmMedia::new(url, MediaKind::Image, vec![1, 2, 3])
    }

    #[test]
    fn test_insert_get_stats() {
        let cache = MediaCache::new(4);
        assert!(cache.is_empty());
        cache.insert(warm("a.jpg"));

        assert!(cache.contains("a.jpg"));
        assert_eq!(cache.get("a.jpg").map(|m| m.size()), Some(3));
        assert!(cache.get("b.jpg").is_none());
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert!((cache.stats().hit_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = MediaCache::new(2);
        cache.insert(warm("a.jpg"));
        cache.insert(warm("b.jpg"));
        // Touch a so b becomes the oldest
        cache.get("a.jpg");
        cache.insert(warm("c.jpg"));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("a.jpg"));
        assert!(!cache.contains("b.jpg"));
        assert!(cache.contains("c.jpg"));
    }

    #[test]
    fn test_reinsert_same_url() {
        let cache = MediaCache::new(2);
        cache.insert(warm("a.jpg"));
        cache.insert(warm("a.jpg"));
        assert_eq!(cache.len(), 1);
    }
}
