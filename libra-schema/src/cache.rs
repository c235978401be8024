//! Memoisation of parsed type specifications.
//!
//! Many columns share a handful of type specs (`Integer`, `String(30)`), so
//! the catalog builder parses each distinct text once and hands out shared
//! descriptors.
//!
//! # Examples
//!
//! ```rust
//! use libra_schema::cache::TypeSpecCache;
//!
//! let cache = TypeSpecCache::new();
//!
//! let first = cache.get_or_parse("String(30)").unwrap();
//! let second = cache.get_or_parse("String(30)").unwrap();
//! assert!(std::sync::Arc::ptr_eq(&first.descriptor, &second.descriptor));
//! assert_eq!(cache.stats().hits, 1);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use smol_str::SmolStr;

use crate::ast::TypeDescriptor;
use crate::error::{Notice, SchemaResult};
use crate::parser::parse_type_spec_with_notices;

/// A parsed spec together with the advisories its parse produced.
#[derive(Debug, Clone)]
pub struct ParsedSpec {
    pub descriptor: Arc<TypeDescriptor>,
    pub notices: Arc<[Notice]>,
}

/// A cache of parsed type specs keyed by their exact text.
///
/// Failed parses are not cached.
#[derive(Debug, Default)]
pub struct TypeSpecCache {
    cache: RwLock<HashMap<SmolStr, ParsedSpec>>,
    stats: RwLock<CacheStats>,
}

/// Statistics for the type-spec cache.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of specs currently cached.
    pub cached_count: usize,
}

impl CacheStats {
    /// Get the cache hit rate.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl TypeSpecCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::with_capacity(capacity)),
            stats: RwLock::default(),
        }
    }

    /// Get a cached descriptor or parse and cache a new one.
    pub fn get_or_parse(&self, spec: &str) -> SchemaResult<ParsedSpec> {
        {
            let cache = self.cache.read();
            if let Some(parsed) = cache.get(spec) {
                self.stats.write().hits += 1;
                return Ok(parsed.clone());
            }
        }

        let (descriptor, notices) = parse_type_spec_with_notices(spec)?;
        let parsed = ParsedSpec {
            descriptor: Arc::new(descriptor),
            notices: notices.into(),
        };

        // Another thread may have won the race; keep whichever landed first.
        let parsed = {
            let mut cache = self.cache.write();
            cache.entry(SmolStr::new(spec)).or_insert(parsed).clone()
        };

        {
            let mut stats = self.stats.write();
            stats.misses += 1;
            stats.cached_count = self.cache.read().len();
        }

        Ok(parsed)
    }

    /// Check if a spec is cached.
    pub fn contains(&self, spec: &str) -> bool {
        self.cache.read().contains_key(spec)
    }

    /// Clear the cache.
    pub fn clear(&self) {
        self.cache.write().clear();
        self.stats.write().cached_count = 0;
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().clone();
        stats.cached_count = self.cache.read().len();
        stats
    }

    /// Get the number of cached specs.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}
