//! In-memory cache of merged search results.
//!
//! Caches the merged, *unshaped* product list keyed by the lowercased
//! query, the sorted source set, the per-source fetch limit and the
//! enhanced flag, so every tier shapes from the same data without seeing
//! another tier's redaction. Uses [`moka`] for async-friendly caching
//! with TTL and automatic eviction.

use std::collections::BTreeSet;
use std::time::Duration;

use moka::future::Cache;

use crate::types::{EnhancementSummary, Product, SourceId};

/// Maximum number of cached result sets.
const MAX_CACHE_ENTRIES: u64 = 100;

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Lowercased, trimmed query string.
    query: String,
    /// Searched sources in canonical order.
    sources: Vec<SourceId>,
    /// Per-source fetch limit the merge was produced with.
    limit: usize,
    enhanced: bool,
}

impl CacheKey {
    /// Build a deterministic key. The query is lowercased and trimmed;
    /// sources are kept in their canonical order so that any permutation
    /// of the same set produces the same key.
    pub fn new(query: &str, sources: &BTreeSet<SourceId>, limit: usize, enhanced: bool) -> Self {
        Self {
            query: query.trim().to_lowercase(),
            sources: sources.iter().copied().collect(),
            limit,
            enhanced,
        }
    }
}

/// A cached merge result.
#[derive(Debug, Clone)]
pub struct CachedMerge {
    pub products: Vec<Product>,
    pub enhancement: Option<EnhancementSummary>,
}

/// Result cache owned by one coordinator. A TTL of zero disables it.
#[derive(Clone)]
pub struct ResultCache {
    inner: Option<Cache<CacheKey, CachedMerge>>,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl ResultCache {
    pub fn new(ttl_seconds: u64) -> Self {
        let inner = (ttl_seconds > 0).then(|| {
            Cache::builder()
                .max_capacity(MAX_CACHE_ENTRIES)
                .time_to_live(Duration::from_secs(ttl_seconds))
                .build()
        });
        Self { inner }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Look up a cached merge. Always `None` when disabled.
    pub async fn get(&self, key: &CacheKey) -> Option<CachedMerge> {
        match &self.inner {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    /// Store a merge. No-op when disabled.
    pub async fn insert(&self, key: CacheKey, value: CachedMerge) {
        if let Some(cache) = &self.inner {
            cache.insert(key, value).await;
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Some(cache) = &self.inner {
            cache.invalidate_all();
        }
    }
}
