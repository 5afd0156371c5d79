//! Permission-lookup cache with TTL expiry
//!
//! Decisions repeat heavily for the same (resource type, action, role set)
//! key while the deployed rule set changes rarely, so the repository lookup
//! is cached behind a blake3 key. The deployment path clears the cache on
//! every apply, so a redeploy is visible immediately.

use blake3::Hasher;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::permission::Permission;
use crate::types::{Action, ResourceType, Role};

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries held at once
    pub capacity: usize,

    /// Time-to-live for cached lookups
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: Duration::from_secs(60),
        }
    }
}

/// Cache key type (blake3 hash)
type CacheKey = [u8; 32];

#[derive(Clone)]
struct CachedEntry {
    permissions: Vec<Permission>,
    cached_at: Instant,
}

impl CachedEntry {
    fn new(permissions: Vec<Permission>) -> Self {
        Self {
            permissions,
            cached_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Statistics about cache performance
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe permission-lookup cache
pub struct PermissionCache {
    entries: Arc<DashMap<CacheKey, CachedEntry>>,
    config: CacheConfig,
    stats: Arc<DashMap<&'static str, usize>>,
}

impl PermissionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            config,
            stats: Arc::new(DashMap::new()),
        }
    }

    /// Cached permissions for a lookup key, if fresh
    pub fn get(
        &self,
        resource_type: &ResourceType,
        action: &Action,
        roles: &BTreeSet<Role>,
    ) -> Option<Vec<Permission>> {
        let key = Self::compute_key(resource_type, action, roles);

        if let Some(entry) = self.entries.get(&key) {
            if entry.is_expired(self.config.ttl) {
                drop(entry);
                self.entries.remove(&key);
                self.increment("expirations");
                return None;
            }

            self.increment("hits");
            return Some(entry.permissions.clone());
        }

        self.increment("misses");
        None
    }

    /// Store a lookup result
    pub fn put(
        &self,
        resource_type: &ResourceType,
        action: &Action,
        roles: &BTreeSet<Role>,
        permissions: Vec<Permission>,
    ) {
        if self.entries.len() >= self.config.capacity {
            // Reclaim expired entries before giving up on the insert.
            let ttl = self.config.ttl;
            self.entries.retain(|_, entry| !entry.is_expired(ttl));
            if self.entries.len() >= self.config.capacity {
                return;
            }
        }

        let key = Self::compute_key(resource_type, action, roles);
        self.entries.insert(key, CachedEntry::new(permissions));
    }

    /// Drop every entry (called on deployment apply)
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Current statistics snapshot
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stat("hits"),
            misses: self.stat("misses"),
            expirations: self.stat("expirations"),
            entries: self.entries.len(),
        }
    }

    fn compute_key(resource_type: &ResourceType, action: &Action, roles: &BTreeSet<Role>) -> CacheKey {
        let mut hasher = Hasher::new();
        hasher.update(resource_type.name().as_bytes());
        hasher.update(b"\0");
        hasher.update(action.key().as_bytes());
        for role in roles {
            hasher.update(b"\0");
            hasher.update(role.key().as_bytes());
        }
        *hasher.finalize().as_bytes()
    }

    fn increment(&self, stat: &'static str) {
        *self.stats.entry(stat).or_insert(0) += 1;
    }

    fn stat(&self, stat: &'static str) -> usize {
        self.stats.get(stat).map(|v| *v).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionContainer;

    fn roles(keys: &[&str]) -> BTreeSet<Role> {
        keys.iter().map(|k| Role::new(*k)).collect()
    }

    fn permission() -> Permission {
        Permission::new(
            ResourceType::new("document"),
            Action::view(),
            Role::new("CASE_WORKER"),
            ConditionContainer::empty(),
        )
    }

    #[test]
    fn test_hit_after_put() {
        let cache = PermissionCache::new(CacheConfig::default());
        let rt = ResourceType::new("document");
        let roles = roles(&["CASE_WORKER"]);

        assert!(cache.get(&rt, &Action::view(), &roles).is_none());
        cache.put(&rt, &Action::view(), &roles, vec![permission()]);

        let cached = cache.get(&rt, &Action::view(), &roles).unwrap();
        assert_eq!(cached.len(), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(stats.hit_rate() > 0.49 && stats.hit_rate() < 0.51);
    }

    #[test]
    fn test_distinct_role_sets_do_not_collide() {
        let cache = PermissionCache::new(CacheConfig::default());
        let rt = ResourceType::new("document");

        cache.put(&rt, &Action::view(), &roles(&["CASE_WORKER"]), vec![permission()]);
        assert!(cache.get(&rt, &Action::view(), &roles(&["ADMIN"])).is_none());
    }

    #[test]
    fn test_expired_entries_are_evicted() {
        let cache = PermissionCache::new(CacheConfig {
            capacity: 16,
            ttl: Duration::from_millis(0),
        });
        let rt = ResourceType::new("document");
        let roles = roles(&["CASE_WORKER"]);

        cache.put(&rt, &Action::view(), &roles, vec![permission()]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&rt, &Action::view(), &roles).is_none());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_clear() {
        let cache = PermissionCache::new(CacheConfig::default());
        let rt = ResourceType::new("document");
        let roles = roles(&["CASE_WORKER"]);

        cache.put(&rt, &Action::view(), &roles, vec![permission()]);
        cache.clear();
        assert!(cache.get(&rt, &Action::view(), &roles).is_none());
    }
}
