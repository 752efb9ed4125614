//! Permission resolution over the role hierarchy
//!
//! The resolver turns a user (or a role) into the transitive closure of the
//! roles it inherits from and the union of every permission those roles
//! grant. Resolution happens in two steps:
//!
//! 1. [`RoleGraph::load`] takes a version-stamped snapshot of the roles
//!    reachable from the starting role.
//! 2. [`expand`] walks that snapshot in memory.
//!
//! Results may be cached per role. A cached entry is only served while the
//! store's graph version still equals the version it was computed from, so
//! any administrative write invalidates it on the next lookup.
//!
//! # Example
//!
//! ```rust
//! use quill_access::{seed, InMemoryRoleStore, PermissionResolver};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryRoleStore::from_seed(seed::platform().with_user("alice", 2)));
//! let resolver = PermissionResolver::new(store);
//!
//! let resolved = resolver.resolve("alice").await?;
//! assert!(resolved.has_permission("POST_PREMIUM_ARTICLE"));
//! assert!(resolved.has_permission("COMMENT"));
//! # Ok(())
//! # }
//! ```

use crate::config::ResolverConfig;
use crate::error::{AccessError, Result};
use crate::graph::RoleGraph;
use crate::store::RoleGraphStore;
use crate::types::{ResolvedPermissionSet, RoleId};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct CachedResolution {
    resolved: ResolvedPermissionSet,
    cached_at: Instant,
}

impl CachedResolution {
    fn new(resolved: ResolvedPermissionSet) -> Self {
        Self {
            resolved,
            cached_at: Instant::now(),
        }
    }

    fn is_fresh(&self, version: u64, ttl: std::time::Duration) -> bool {
        self.resolved.graph_version == version && self.cached_at.elapsed() <= ttl
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

/// Resolves users and roles to their inherited permission sets
///
/// # Thread Safety
///
/// Cloning is cheap and clones share the cache. Concurrent resolutions never
/// block each other.
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn RoleGraphStore>,
    cache: Arc<DashMap<RoleId, CachedResolution>>,
    counters: Arc<Counters>,
    config: ResolverConfig,
}

impl PermissionResolver {
    /// Create a resolver with default settings
    pub fn new(store: Arc<dyn RoleGraphStore>) -> Self {
        Self::with_config(store, ResolverConfig::default())
    }

    /// Create a resolver with custom settings
    pub fn with_config(store: Arc<dyn RoleGraphStore>, config: ResolverConfig) -> Self {
        Self {
            store,
            cache: Arc::new(DashMap::new()),
            counters: Arc::new(Counters::default()),
            config,
        }
    }

    /// Resolve the permission set of a user's assigned role.
    ///
    /// # Errors
    ///
    /// `NotFound` if the user does not exist or has no role, plus everything
    /// [`resolve_role`](Self::resolve_role) can return.
    pub async fn resolve(&self, user_id: &str) -> Result<ResolvedPermissionSet> {
        let role_id = self
            .store
            .user_role(user_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("user {} has no assigned role", user_id)))?;

        self.resolve_role(role_id).await
    }

    /// Resolve the permission set reachable from a role
    pub async fn resolve_role(&self, role_id: RoleId) -> Result<ResolvedPermissionSet> {
        if !self.config.cache_enabled {
            return self.load_and_expand(role_id).await;
        }

        let version = self.store.graph_version().await?;

        if let Some(entry) = self.cache.get(&role_id) {
            if entry.is_fresh(version, self.config.cache_ttl()) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.resolved.clone());
            }
            drop(entry);
            self.cache.remove(&role_id);
            self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let resolved = self.load_and_expand(role_id).await?;
        self.remember(role_id, &resolved, version);

        Ok(resolved)
    }

    /// Store backing this resolver
    pub fn store(&self) -> &Arc<dyn RoleGraphStore> {
        &self.store
    }

    /// Resolver settings
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Drop every cached resolution
    pub fn invalidate_cache(&self) {
        let size = self.cache.len() as u64;
        self.cache.clear();
        self.counters.invalidations.fetch_add(size, Ordering::Relaxed);
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            size: self.cache.len(),
            max_size: self.config.cache_capacity,
            ttl_seconds: self.config.cache_ttl_secs,
        }
    }

    async fn load_and_expand(&self, role_id: RoleId) -> Result<ResolvedPermissionSet> {
        let graph = RoleGraph::load(self.store.as_ref(), role_id, self.config.snapshot_retries).await?;
        let resolved = expand(&graph, role_id)?;

        debug!(
            role_id,
            roles = resolved.roles.len(),
            permissions = resolved.permissions.len(),
            graph_version = resolved.graph_version,
            "Resolved role"
        );
        Ok(resolved)
    }

    fn remember(&self, role_id: RoleId, resolved: &ResolvedPermissionSet, version: u64) {
        // A snapshot taken after a newer write is still correct, but it would
        // be discarded on the next lookup anyway.
        if resolved.graph_version != version {
            return;
        }

        if self.cache.len() >= self.config.cache_capacity && !self.cache.contains_key(&role_id) {
            let before = self.cache.len();
            self.cache
                .retain(|_, entry| entry.resolved.graph_version == version);
            let evicted = before.saturating_sub(self.cache.len()) as u64;
            self.counters.invalidations.fetch_add(evicted, Ordering::Relaxed);

            if self.cache.len() >= self.config.cache_capacity {
                return;
            }
        }

        self.cache.insert(role_id, CachedResolution::new(resolved.clone()));
    }
}

/// Closure of `root` within a loaded snapshot.
///
/// Depth-first walk with a visited set keyed by arena index: each role is
/// expanded at most once, so cycles terminate.
pub fn expand(graph: &RoleGraph, root: RoleId) -> Result<ResolvedPermissionSet> {
    let start = graph
        .index_of(root)
        .ok_or_else(|| AccessError::NotFound(format!("role {}", root)))?;

    let mut visited = vec![false; graph.len()];
    let mut stack = vec![start];
    let mut roles = BTreeSet::new();
    let mut permissions = BTreeSet::new();

    while let Some(idx) = stack.pop() {
        if visited[idx] {
            continue;
        }
        visited[idx] = true;

        let node = graph.node(idx);
        roles.insert(node.role.name.clone());
        permissions.extend(node.grants.iter().cloned());

        stack.extend(graph.parents_of(idx).iter().filter(|p| !visited[**p]));
    }

    Ok(ResolvedPermissionSet {
        root,
        roles,
        permissions,
        graph_version: graph.version(),
    })
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that loaded from the store
    pub misses: u64,
    /// Entries dropped as stale, expired or on request
    pub invalidations: u64,
    /// Current cache size
    pub size: usize,
    /// Maximum cache size
    pub max_size: usize,
    /// Cache TTL in seconds
    pub ttl_seconds: u64,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
