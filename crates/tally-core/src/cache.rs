//! Result caching using Moka
//!
//! Forecasts, insights and dashboards are expensive to rebuild and change
//! slowly, so the server keeps serialized results per tenant for a while.
//! Each kind of result has its own cache and TTL.

use std::time::Duration;

use moka::sync::Cache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Cache sizing and lifetimes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries per result kind
    pub max_capacity: u64,
    pub forecast_ttl_secs: u64,
    pub insights_ttl_secs: u64,
    pub dashboard_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1_000,
            forecast_ttl_secs: 1_800, // 30 minutes
            insights_ttl_secs: 3_600, // 1 hour
            dashboard_ttl_secs: 900,  // 15 minutes
        }
    }
}

/// Which result is being cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Forecast,
    Insights,
    Dashboard,
}

impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forecast => "forecast",
            Self::Insights => "insights",
            Self::Dashboard => "dashboard",
        }
    }
}

/// A value plus whether it was served from cache
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub from_cache: bool,
}

/// Identity of a cached result
///
/// The parts stay separate fields, so no user or client id can collide with
/// another tenant's key however it is spelled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: CacheKind,
    pub user_id: String,
    pub client_id: Option<String>,
    /// Request variant such as the time range or an explicit as-of date
    pub variant: Option<String>,
}

/// Build the key for one tenant's result of `kind`
pub fn cache_key(kind: CacheKind, user_id: &str, client_id: Option<&str>, variant: Option<&str>) -> CacheKey {
    CacheKey {
        kind,
        user_id: user_id.to_string(),
        client_id: client_id.map(str::to_string),
        variant: variant.map(str::to_string),
    }
}

/// Per-kind TTL caches of JSON results
#[derive(Clone)]
pub struct ResultCache {
    forecast: Cache<CacheKey, serde_json::Value>,
    insights: Cache<CacheKey, serde_json::Value>,
    dashboard: Cache<CacheKey, serde_json::Value>,
    config: CacheConfig,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        let build = |ttl_secs: u64| {
            Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(Duration::from_secs(ttl_secs))
                .build()
        };

        Self {
            forecast: build(config.forecast_ttl_secs),
            insights: build(config.insights_ttl_secs),
            dashboard: build(config.dashboard_ttl_secs),
            config,
        }
    }

    fn cache(&self, kind: CacheKind) -> &Cache<CacheKey, serde_json::Value> {
        match kind {
            CacheKind::Forecast => &self.forecast,
            CacheKind::Insights => &self.insights,
            CacheKind::Dashboard => &self.dashboard,
        }
    }

    /// TTL in seconds for a kind, used for `Cache-Control` headers
    pub fn ttl_secs(&self, kind: CacheKind) -> u64 {
        match kind {
            CacheKind::Forecast => self.config.forecast_ttl_secs,
            CacheKind::Insights => self.config.insights_ttl_secs,
            CacheKind::Dashboard => self.config.dashboard_ttl_secs,
        }
    }

    /// Cached value for `key`, if present and still readable as `T`
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let cache = self.cache(key.kind);
        let json = cache.get(key)?;
        match serde_json::from_value(json) {
            Ok(value) => {
                debug!(kind = key.kind.as_str(), user_id = %key.user_id, "Cache hit");
                Some(value)
            }
            Err(e) => {
                debug!(kind = key.kind.as_str(), error = %e, "Discarding stale cache entry");
                cache.invalidate(key);
                None
            }
        }
    }

    pub fn insert<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<()> {
        self.cache(key.kind)
            .insert(key.clone(), serde_json::to_value(value)?);
        debug!(kind = key.kind.as_str(), user_id = %key.user_id, "Cache stored");
        Ok(())
    }

    /// Return the cached value for `key`, or compute and store it.
    ///
    /// Errors from `compute` are returned and nothing is cached.
    pub fn get_or_compute<T, F>(&self, key: &CacheKey, compute: F) -> Result<Cached<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.get(key) {
            return Ok(Cached {
                value,
                from_cache: true,
            });
        }

        let value = compute()?;
        self.insert(key, &value)?;

        Ok(Cached {
            value,
            from_cache: false,
        })
    }

    /// Live entries across all kinds
    ///
    /// Pending inserts and expirations are applied first so the count is exact.
    pub fn entry_count(&self) -> u64 {
        [&self.forecast, &self.insights, &self.dashboard]
            .into_iter()
            .map(|cache| {
                cache.run_pending_tasks();
                cache.entry_count()
            })
            .sum()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("entries", &self.entry_count())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::Cell;

    fn key(kind: CacheKind, name: &str) -> CacheKey {
        cache_key(kind, name, None, None)
    }

    #[test]
    fn test_cache_key_parts_do_not_collide() {
        let all_clients = cache_key(CacheKind::Forecast, "acme", None, Some("90days"));
        let client_named_none = cache_key(CacheKind::Forecast, "acme", Some("none"), Some("90days"));
        assert_ne!(all_clients, client_named_none);

        let colon_user = cache_key(CacheKind::Forecast, "a:b", None, Some("90days"));
        let colon_client = cache_key(CacheKind::Forecast, "a", Some("b:none"), Some("90days"));
        assert_ne!(colon_user, colon_client);

        assert_eq!(
            cache_key(CacheKind::Insights, "u1", Some("c9"), None),
            cache_key(CacheKind::Insights, "u1", Some("c9"), None)
        );
    }

    #[test]
    fn test_colliding_spellings_cached_separately() {
        let cache = ResultCache::new();
        cache
            .insert(&cache_key(CacheKind::Dashboard, "a:b", None, None), &9999u32)
            .unwrap();

        let other = cache_key(CacheKind::Dashboard, "a", Some("b:none"), None);
        assert_eq!(cache.get::<u32>(&other), None);
    }

    #[test]
    fn test_get_or_compute_hits_second_time() {
        let cache = ResultCache::new();
        let k = key(CacheKind::Forecast, "u1");
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok(vec![1.5, 2.5])
        };

        let first: Cached<Vec<f64>> = cache.get_or_compute(&k, compute).unwrap();
        assert!(!first.from_cache);

        let second: Cached<Vec<f64>> = cache
            .get_or_compute(&k, || {
                calls.set(calls.get() + 1);
                Ok(vec![9.0])
            })
            .unwrap();
        assert!(second.from_cache);
        assert_eq!(second.value, vec![1.5, 2.5]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_kinds_are_separate() {
        let cache = ResultCache::new();
        cache
            .get_or_compute(&key(CacheKind::Forecast, "u1"), || Ok(1u32))
            .unwrap();
        let other = cache
            .get_or_compute(&key(CacheKind::Dashboard, "u1"), || Ok(2u32))
            .unwrap();
        assert!(!other.from_cache);
        assert_eq!(other.value, 2);
    }

    #[test]
    fn test_errors_not_cached() {
        let cache = ResultCache::new();
        let k = key(CacheKind::Insights, "u1");
        let failed: Result<Cached<u32>> =
            cache.get_or_compute(&k, || Err(Error::Insight("boom".to_string())));
        assert!(failed.is_err());

        let ok = cache.get_or_compute(&k, || Ok(7u32)).unwrap();
        assert!(!ok.from_cache);
    }

    #[test]
    fn test_get_insert_and_stale_entries() {
        let cache = ResultCache::new();
        let k = key(CacheKind::Insights, "u1");
        assert_eq!(cache.get::<u32>(&k), None);

        cache.insert(&k, &"text").unwrap();
        assert_eq!(cache.get::<String>(&k).as_deref(), Some("text"));

        // Not readable as a number, so it is dropped
        assert_eq!(cache.get::<u32>(&k), None);
        assert_eq!(cache.get::<String>(&k), None);
    }

    #[test]
    fn test_entry_count() {
        let cache = ResultCache::new();
        assert_eq!(cache.entry_count(), 0);

        cache
            .get_or_compute(&key(CacheKind::Forecast, "a"), || Ok(1u32))
            .unwrap();
        cache
            .get_or_compute(&key(CacheKind::Insights, "b"), || Ok(2u32))
            .unwrap();
        assert_eq!(cache.entry_count(), 2);
    }

    #[test]
    fn test_ttl_defaults() {
        let cache = ResultCache::new();
        assert_eq!(cache.ttl_secs(CacheKind::Forecast), 1800);
        assert_eq!(cache.ttl_secs(CacheKind::Insights), 3600);
        assert_eq!(cache.ttl_secs(CacheKind::Dashboard), 900);
    }
}
