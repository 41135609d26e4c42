//! Match result caching.
//!
//! [`MatchCache`] remembers the outcome of matching a pathname against the
//! route tree, including "no match" outcomes. It is gated behind the `cache`
//! feature flag and uses the [`lru`] crate internally.
//!
//! The router clears the cache whenever routes are patched in, since new
//! routes can change both positive and negative results.
//!
//! # Examples
//!
//! ```
//! use data_navigator::cache::MatchCache;
//!
//! let mut cache = MatchCache::new();
//! assert!(cache.get("/users").is_none());
//! cache.insert("/users".to_string(), None);
//!
//! // A cached "no match" is a hit.
//! assert_eq!(cache.get("/users"), Some(None));
//! assert_eq!(cache.stats().hits, 1);
//! assert_eq!(cache.stats().misses, 1);
//! ```

use crate::matching::RouteMatch;
use crate::{debug_log, trace_log};
use lru::LruCache;
use std::num::NonZeroUsize;

/// Counters tracking cache hit/miss rates and invalidations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    /// Number of full invalidations (via [`MatchCache::clear`]).
    pub invalidations: usize,
}

impl CacheStats {
    /// Hit rate as a value in `0.0..=1.0`; `0.0` before any lookup.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache of match results keyed by pathname.
#[derive(Debug)]
pub struct MatchCache {
    entries: LruCache<String, Option<Vec<RouteMatch>>>,
    stats: CacheStats,
}

impl MatchCache {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a cache holding at most `capacity` pathnames (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(cap),
            stats: CacheStats::default(),
        }
    }

    /// Look up a pathname. `Some(None)` is a cached "no match".
    pub fn get(&mut self, pathname: &str) -> Option<Option<Vec<RouteMatch>>> {
        if let Some(entry) = self.entries.get(pathname) {
            self.stats.hits += 1;
            trace_log!("Match cache hit for '{}'", pathname);
            Some(entry.clone())
        } else {
            self.stats.misses += 1;
            trace_log!("Match cache miss for '{}'", pathname);
            None
        }
    }

    pub fn insert(&mut self, pathname: String, matches: Option<Vec<RouteMatch>>) {
        self.entries.push(pathname, matches);
    }

    /// Drop every entry and count an invalidation.
    pub fn clear(&mut self) {
        let removed = self.entries.len();
        self.entries.clear();
        self.stats.invalidations += 1;
        debug_log!(
            "Match cache cleared: {} entries removed ({} total invalidations, hit rate: {:.1}%)",
            removed,
            self.stats.invalidations,
            self.stats.hit_rate() * 100.0
        );
    }

    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MatchCache {
    fn default() -> Self {
        Self::new()
    }
}
