//! Two-tier lookup cache
//!
//! Fast tier: process-local map guarded by a mutex, consulted first, entries
//! past their expiry treated as absent and evicted lazily on access.
//! Shared tier: optional Redis, probed once at startup; every operation is
//! error-absorbed so a degraded Redis can only ever look like a cache miss,
//! never a failure. Shared-tier hits re-populate the fast tier, so a fast-tier
//! entry is never staler than the shared one.
//!
//! The classification hierarchy is cached as one bulk blob under
//! `lookups:all` and point lookups are served from that blob, avoiding N+1
//! reads against the backing store on every reconciliation page.

use chrono::{DateTime, Utc};
use redis::Commands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{Config, SHARED_CACHE_TIMEOUT};
use crate::db::models::{ChartPlan, Classification, LineItem};

/// Key under which the bulk hierarchy blob is stored
pub const LOOKUPS_KEY: &str = "lookups:all";

/// Cache entry categories, each with its own TTL. Structural hierarchy data
/// changes rarely and gets a long TTL; transactional statistics go stale fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Lookups,
    Statistics,
    Dynamic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupSnapshot {
    pub classifications: HashMap<i64, Classification>,
    pub plans: HashMap<i64, ChartPlan>,
    pub items: HashMap<i64, LineItem>,
    pub loaded_at: DateTime<Utc>,
}

struct FastEntry {
    value: String,
    expires_at: Instant,
    kind: CacheKind,
}

/// Diagnostics surface; observability only, not part of the lookup contract.
#[derive(Debug, Clone, Serialize)]
pub struct CacheHealth {
    pub shared_tier_connected: bool,
    pub fast_tier_entries: usize,
}

pub struct LookupCache {
    fast: Mutex<HashMap<String, FastEntry>>,
    shared: Option<Mutex<redis::Connection>>,
    ttls: Ttls,
}

#[derive(Debug, Clone, Copy)]
struct Ttls {
    lookups: Duration,
    statistics: Duration,
    default: Duration,
}

impl LookupCache {
    /// Build the cache, probing the shared tier once. An unreachable Redis is
    /// logged and the cache degrades to fast-tier-only operation.
    pub fn new(config: &Config) -> Self {
        let shared = config.redis_url.as_deref().and_then(connect_shared);

        LookupCache {
            fast: Mutex::new(HashMap::new()),
            shared: shared.map(Mutex::new),
            ttls: Ttls {
                lookups: Duration::from_secs(config.lookups_ttl_secs),
                statistics: Duration::from_secs(config.statistics_ttl_secs),
                default: Duration::from_secs(config.default_ttl_secs),
            },
        }
    }

    /// Fast-tier-only cache, for deployments without Redis and for tests.
    pub fn in_process_only() -> Self {
        LookupCache {
            fast: Mutex::new(HashMap::new()),
            shared: None,
            ttls: Ttls {
                lookups: Duration::from_secs(3600),
                statistics: Duration::from_secs(60),
                default: Duration::from_secs(300),
            },
        }
    }

    fn ttl_for(&self, kind: CacheKind) -> Duration {
        match kind {
            CacheKind::Lookups => self.ttls.lookups,
            CacheKind::Statistics => self.ttls.statistics,
            CacheKind::Dynamic => self.ttls.default,
        }
    }

    /// Read a value: fast tier first, then the shared tier. A shared-tier hit
    /// re-populates the fast tier with the kind's TTL.
    pub fn get(&self, key: &str, kind: CacheKind) -> Option<String> {
        {
            let mut fast = self.fast.lock().expect("fast-tier mutex poisoned");
            if let Some(entry) = fast.get(key) {
                if entry.expires_at > Instant::now() {
                    return Some(entry.value.clone());
                }
                // Expired, evict lazily
                fast.remove(key);
            }
        }

        let value = self.shared_get(key)?;
        self.fast_set(key, &value, kind);
        Some(value)
    }

    /// Write to the fast tier and, when available, the shared tier. A
    /// shared-tier write failure is logged but does not fail the set.
    pub fn set(&self, key: &str, value: &str, kind: CacheKind) -> bool {
        self.fast_set(key, value, kind);
        self.shared_set(key, value, self.ttl_for(kind));
        true
    }

    /// Remove a key from both tiers.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self
            .fast
            .lock()
            .expect("fast-tier mutex poisoned")
            .remove(key)
            .is_some();
        self.shared_delete(key);
        removed
    }

    /// Remove every key matching a `prefix*suffix` glob (at most one
    /// wildcard) from both tiers; returns the total removed count.
    ///
    /// A `kind` restricts the fast-tier sweep to entries stored under that
    /// kind. Shared-tier keys carry no kind tag, so the shared sweep is
    /// always pattern-only.
    pub fn invalidate_pattern(&self, pattern: &str, kind: Option<CacheKind>) -> usize {
        let mut removed = 0;

        {
            let mut fast = self.fast.lock().expect("fast-tier mutex poisoned");
            let matching: Vec<String> = fast
                .iter()
                .filter(|(k, entry)| {
                    glob_match(pattern, k) && kind.map_or(true, |kd| entry.kind == kd)
                })
                .map(|(k, _)| k.clone())
                .collect();
            for key in matching {
                fast.remove(&key);
                removed += 1;
            }
        }

        removed += self.shared_invalidate(pattern);
        debug!("Invalidated {} keys matching '{}'", removed, pattern);
        removed
    }

    /// Store the bulk hierarchy blob, keyed by entity id.
    pub fn set_all_lookups(
        &self,
        classifications: Vec<Classification>,
        plans: Vec<ChartPlan>,
        items: Vec<LineItem>,
    ) -> bool {
        let snapshot = LookupSnapshot {
            classifications: classifications.into_iter().map(|c| (c.id, c)).collect(),
            plans: plans.into_iter().map(|p| (p.id, p)).collect(),
            items: items.into_iter().map(|i| (i.id, i)).collect(),
            loaded_at: Utc::now(),
        };
        match serde_json::to_string(&snapshot) {
            Ok(json) => self.set(LOOKUPS_KEY, &json, CacheKind::Lookups),
            Err(e) => {
                warn!("Could not serialize lookup snapshot: {}", e);
                false
            }
        }
    }

    /// Retrieve the bulk hierarchy blob, if cached.
    pub fn get_all_lookups(&self) -> Option<LookupSnapshot> {
        let json = self.get(LOOKUPS_KEY, CacheKind::Lookups)?;
        match serde_json::from_str(&json) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Discarding undecodable lookup snapshot: {}", e);
                self.delete(LOOKUPS_KEY);
                None
            }
        }
    }

    /// Point lookup against the bulk blob. On a miss the caller is expected
    /// to reload the hierarchy and retry once before concluding "not found".
    pub fn get_classification_by_id(&self, id: i64) -> Option<Classification> {
        self.get_all_lookups()?.classifications.get(&id).cloned()
    }

    pub fn get_plan_by_id(&self, id: i64) -> Option<ChartPlan> {
        self.get_all_lookups()?.plans.get(&id).cloned()
    }

    pub fn get_item_by_id(&self, id: i64) -> Option<LineItem> {
        self.get_all_lookups()?.items.get(&id).cloned()
    }

    pub fn health(&self) -> CacheHealth {
        let shared_tier_connected = match &self.shared {
            Some(conn) => {
                let mut conn = conn.lock().expect("shared-tier mutex poisoned");
                redis::cmd("PING").query::<String>(&mut conn).is_ok()
            }
            None => false,
        };
        CacheHealth {
            shared_tier_connected,
            fast_tier_entries: self.fast.lock().expect("fast-tier mutex poisoned").len(),
        }
    }

    fn fast_set(&self, key: &str, value: &str, kind: CacheKind) {
        self.fast.lock().expect("fast-tier mutex poisoned").insert(
            key.to_string(),
            FastEntry {
                value: value.to_string(),
                expires_at: Instant::now() + self.ttl_for(kind),
                kind,
            },
        );
    }

    // Shared-tier operations: any error degrades to miss/no-op with a warn.

    fn shared_get(&self, key: &str) -> Option<String> {
        let conn = self.shared.as_ref()?;
        let mut conn = conn.lock().expect("shared-tier mutex poisoned");
        match conn.get::<_, Option<String>>(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Shared cache GET {} failed: {}", key, e);
                None
            }
        }
    }

    fn shared_set(&self, key: &str, value: &str, ttl: Duration) {
        if let Some(conn) = self.shared.as_ref() {
            let mut conn = conn.lock().expect("shared-tier mutex poisoned");
            if let Err(e) = conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()) {
                warn!("Shared cache SET {} failed: {}", key, e);
            }
        }
    }

    fn shared_delete(&self, key: &str) {
        if let Some(conn) = self.shared.as_ref() {
            let mut conn = conn.lock().expect("shared-tier mutex poisoned");
            if let Err(e) = conn.del::<_, ()>(key) {
                warn!("Shared cache DEL {} failed: {}", key, e);
            }
        }
    }

    fn shared_invalidate(&self, pattern: &str) -> usize {
        let Some(conn) = self.shared.as_ref() else {
            return 0;
        };
        let mut conn = conn.lock().expect("shared-tier mutex poisoned");
        let keys: Vec<String> = match conn.keys(pattern) {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Shared cache KEYS {} failed: {}", pattern, e);
                return 0;
            }
        };
        let mut removed = 0;
        for key in keys {
            match conn.del::<_, ()>(&key) {
                Ok(_) => removed += 1,
                Err(e) => warn!("Shared cache DEL {} failed: {}", key, e),
            }
        }
        removed
    }
}

fn connect_shared(url: &str) -> Option<redis::Connection> {
    let client = match redis::Client::open(url) {
        Ok(client) => client,
        Err(e) => {
            warn!("Invalid Redis URL, shared cache tier disabled: {}", e);
            return None;
        }
    };
    match client.get_connection_with_timeout(SHARED_CACHE_TIMEOUT) {
        Ok(conn) => {
            let _ = conn.set_read_timeout(Some(SHARED_CACHE_TIMEOUT));
            let _ = conn.set_write_timeout(Some(SHARED_CACHE_TIMEOUT));
            info!("Connected to shared cache tier at {}", url);
            Some(conn)
        }
        Err(e) => {
            warn!(
                "Shared cache tier unreachable, using in-process tier only: {}",
                e
            );
            None
        }
    }
}

/// Simple `prefix*suffix` glob with at most one wildcard.
fn glob_match(pattern: &str, key: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            key.len() >= prefix.len() + suffix.len()
                && key.starts_with(prefix)
                && key.ends_with(suffix)
        }
        None => pattern == key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hierarchy() -> (Vec<Classification>, Vec<ChartPlan>, Vec<LineItem>) {
        (
            vec![Classification {
                id: 1,
                name: "Despesas".to_string(),
            }],
            vec![ChartPlan {
                id: 10,
                classification_id: 1,
                name: "Administrativas".to_string(),
            }],
            vec![LineItem {
                id: 100,
                plan_id: 10,
                name: "Energia".to_string(),
            }],
        )
    }

    #[test]
    fn test_set_then_get_without_shared_tier() {
        // With the shared tier absent, operations never fail and reads are
        // served from the fast tier.
        let cache = LookupCache::in_process_only();
        assert!(cache.set("k", "v", CacheKind::Dynamic));
        assert_eq!(cache.get("k", CacheKind::Dynamic), Some("v".to_string()));
        assert!(cache.delete("k"));
        assert_eq!(cache.get("k", CacheKind::Dynamic), None);
    }

    #[test]
    fn test_ttl_differentiation() {
        let cache = LookupCache::in_process_only();
        // Statistics TTL is 60s, lookups 3600s; an entry written under the
        // lookups kind outlives the statistics window.
        assert!(cache.ttl_for(CacheKind::Lookups) > cache.ttl_for(CacheKind::Statistics));

        // Force-expire a statistics entry and confirm lazy eviction
        cache.set("stats:summary", "{}", CacheKind::Statistics);
        {
            let mut fast = cache.fast.lock().unwrap();
            fast.get_mut("stats:summary").unwrap().expires_at =
                Instant::now() - Duration::from_secs(1);
        }
        assert_eq!(cache.get("stats:summary", CacheKind::Statistics), None);

        cache.set("lookups:all", "{}", CacheKind::Lookups);
        assert!(cache.get("lookups:all", CacheKind::Lookups).is_some());
    }

    #[test]
    fn test_invalidate_pattern_exactness() {
        let cache = LookupCache::in_process_only();
        cache.set("lookups:classification:1", "a", CacheKind::Lookups);
        cache.set("lookups:classification:2", "b", CacheKind::Lookups);
        cache.set("other:1", "c", CacheKind::Dynamic);

        let removed = cache.invalidate_pattern("lookups:classification:*", None);
        assert_eq!(removed, 2);
        assert_eq!(cache.get("lookups:classification:1", CacheKind::Lookups), None);
        assert_eq!(cache.get("lookups:classification:2", CacheKind::Lookups), None);
        assert_eq!(
            cache.get("other:1", CacheKind::Dynamic),
            Some("c".to_string())
        );
    }

    #[test]
    fn test_invalidate_pattern_kind_filter() {
        let cache = LookupCache::in_process_only();
        cache.set("reports:daily", "a", CacheKind::Statistics);
        cache.set("reports:catalog", "b", CacheKind::Lookups);

        // Only entries stored under the named kind are swept
        let removed = cache.invalidate_pattern("reports:*", Some(CacheKind::Statistics));
        assert_eq!(removed, 1);
        assert!(cache.get("reports:daily", CacheKind::Statistics).is_none());
        assert_eq!(
            cache.get("reports:catalog", CacheKind::Lookups),
            Some("b".to_string())
        );
    }

    #[test]
    fn test_glob_match_rules() {
        assert!(glob_match("lookups:*", "lookups:all"));
        assert!(glob_match("*:all", "lookups:all"));
        assert!(glob_match("lookups:all", "lookups:all"));
        assert!(!glob_match("lookups:*", "stats:summary"));
        assert!(!glob_match("lookups:all", "lookups:al"));
        // The wildcard may match the empty string
        assert!(glob_match("lookups:*", "lookups:"));
        // Prefix and suffix must not overlap
        assert!(!glob_match("abc*bc", "abc"));
    }

    #[test]
    fn test_lookup_blob_roundtrip() {
        let cache = LookupCache::in_process_only();
        let (classifications, plans, items) = sample_hierarchy();
        assert!(cache.set_all_lookups(classifications, plans, items));

        let snapshot = cache.get_all_lookups().unwrap();
        assert_eq!(snapshot.classifications.len(), 1);
        assert_eq!(snapshot.plans[&10].name, "Administrativas");

        assert_eq!(cache.get_classification_by_id(1).unwrap().name, "Despesas");
        assert_eq!(cache.get_plan_by_id(10).unwrap().classification_id, 1);
        assert_eq!(cache.get_item_by_id(100).unwrap().plan_id, 10);
        assert!(cache.get_classification_by_id(99).is_none());
    }

    #[test]
    fn test_health_reports_sizes() {
        let cache = LookupCache::in_process_only();
        cache.set("a", "1", CacheKind::Dynamic);
        cache.set("b", "2", CacheKind::Dynamic);
        let health = cache.health();
        assert!(!health.shared_tier_connected);
        assert_eq!(health.fast_tier_entries, 2);
    }

    #[test]
    fn test_unreachable_shared_tier_degrades() {
        let config = Config {
            db_path: std::path::PathBuf::from(":memory:"),
            redis_url: Some("redis://127.0.0.1:1/".to_string()),
            lookups_ttl_secs: 3600,
            statistics_ttl_secs: 60,
            default_ttl_secs: 300,
        };
        let cache = LookupCache::new(&config);
        // Connection failed at startup; everything still works locally
        assert!(cache.set("k", "v", CacheKind::Dynamic));
        assert_eq!(cache.get("k", CacheKind::Dynamic), Some("v".to_string()));
    }
}
