//! Short-lived response cache with request deduplication.
//!
//! Entries are keyed by the deterministic request signature, so identical
//! calls from different call sites collapse onto one slot. A successful
//! call with an empty result set is cached like any other success; only
//! errors skip the cache write. Expiry is lazy - checked at read time, not
//! swept proactively.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::request::ApiRequest;

/// Default entry lifetime: 15 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Value,
    category: String,
    expires_at: Instant,
    access_count: u64,
    last_accessed: Option<Instant>,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub entries_by_category: HashMap<String, usize>,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// In-process TTL cache scoped to one client instance.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    inner: Mutex<CacheInner>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh payload for this request, or `None`.
    ///
    /// An expired entry is removed and reported exactly like a never-cached
    /// one; callers cannot distinguish the two.
    pub async fn get(&self, request: &ApiRequest) -> Option<Value> {
        let signature = request.signature();
        let mut inner = self.inner.lock().await;
        match inner.entries.get_mut(&signature) {
            Some(entry) if Instant::now() < entry.expires_at => {
                entry.access_count += 1;
                entry.last_accessed = Some(Instant::now());
                let payload = entry.payload.clone();
                inner.hits += 1;
                Some(payload)
            }
            Some(_) => {
                debug!("Cache entry for {} expired", request.method());
                inner.entries.remove(&signature);
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a successful payload under the request's signature.
    pub async fn put(&self, request: &ApiRequest, payload: &Value) {
        let entry = CacheEntry {
            payload: payload.clone(),
            category: request.category(),
            expires_at: Instant::now() + self.ttl,
            access_count: 0,
            last_accessed: None,
        };
        let mut inner = self.inner.lock().await;
        inner.entries.insert(request.signature(), entry);
    }

    /// Drop all entries. Called between independent top-level runs to bound
    /// memory and avoid cross-run staleness; counters survive.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        let mut entries_by_category: HashMap<String, usize> = HashMap::new();
        for entry in inner.entries.values() {
            *entries_by_category.entry(entry.category.clone()).or_default() += 1;
        }
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
            entries_by_category,
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(method: &str) -> ApiRequest {
        ApiRequest::new(method).with_param("id", 7)
    }

    #[tokio::test]
    async fn test_hit_after_put() {
        let cache = ResponseCache::default();
        let req = request("crm.company.get");
        assert_eq!(cache.get(&req).await, None);

        cache.put(&req, &json!({"result": {"ID": "7"}})).await;
        assert_eq!(cache.get(&req).await, Some(json!({"result": {"ID": "7"}})));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_payload_is_a_valid_entry() {
        let cache = ResponseCache::default();
        let req = request("crm.invoice.productrows.get");
        cache.put(&req, &json!({"result": []})).await;
        assert_eq!(cache.get(&req).await, Some(json!({"result": []})));
        assert_eq!(cache.stats().await.hits, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_miss() {
        let cache = ResponseCache::new(Duration::from_millis(20));
        assert_eq!(cache.ttl(), Duration::from_millis(20));
        let req = request("crm.company.get");
        cache.put(&req, &json!({"result": 1})).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get(&req).await, None);
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test]
    async fn test_clear_drops_entries_but_keeps_counters() {
        let cache = ResponseCache::default();
        let req = request("crm.company.get");
        cache.put(&req, &json!(1)).await;
        assert!(cache.get(&req).await.is_some());

        cache.clear().await;
        assert_eq!(cache.get(&req).await, None);
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test]
    async fn test_entries_bucketed_by_method_family() {
        let cache = ResponseCache::default();
        cache.put(&request("crm.company.get"), &json!(1)).await;
        cache
            .put(&request("crm.invoice.productrows.get"), &json!(2))
            .await;
        cache.put(&request("crm.invoice.list"), &json!(3)).await;

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.entries_by_category.get("crm.company"), Some(&1));
        assert_eq!(stats.entries_by_category.get("crm.invoice"), Some(&2));
    }
}
