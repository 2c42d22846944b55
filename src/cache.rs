//! Time-bounded permission cache
//!
//! Wraps any [`PermissionEvaluator`] and memoizes its output per client ID for
//! a fixed time-to-live. The number of cached clients is bounded; the least
//! recently used client is evicted first. Expiry is checked on access, there
//! is no background timer.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::config::{CacheConfig, ClientData};
use crate::error::Result;
use crate::evaluator::PermissionEvaluator;
use crate::permission::PermissionSet;

/// Source of the current time for expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    elapsed: Mutex<Duration>,
}

#[cfg(any(test, feature = "test-util"))]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }
}

/// Cached permission set with its expiry
#[derive(Debug, Clone)]
struct CacheEntry {
    permissions: PermissionSet,
    /// `None` when the TTL overflows `Instant`; such entries never expire
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(permissions: PermissionSet, now: Instant, ttl: Duration) -> Self {
        Self {
            permissions,
            expires_at: now.checked_add(ttl),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
}

/// Memoizing decorator around a permission evaluator
pub struct PermissionCache<E> {
    evaluator: E,
    /// `None` when caching is disabled or has no capacity
    entries: Option<Mutex<LruCache<String, CacheEntry>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    counters: Counters,
    /// Bumped under the entries lock by `invalidate` and `clear`
    generation: AtomicU64,
}

impl<E: PermissionEvaluator> PermissionCache<E> {
    /// Create a cache using the system clock
    pub fn new(evaluator: E, config: &CacheConfig) -> Self {
        Self::with_clock(evaluator, config, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`
    pub fn with_clock(evaluator: E, config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let entries = if config.enabled {
            NonZeroUsize::new(config.max_entries).map(|cap| Mutex::new(LruCache::new(cap)))
        } else {
            None
        };

        if entries.is_none() {
            debug!(
                evaluator = %evaluator.name(),
                "Permission cache disabled, evaluating on every request"
            );
        }

        Self {
            evaluator,
            entries,
            ttl: config.ttl(),
            clock,
            counters: Counters::default(),
            generation: AtomicU64::new(0),
        }
    }

    /// Return the cached permissions for a client, evaluating on miss or expiry
    ///
    /// Evaluation runs outside the lock. Concurrent misses for the same client
    /// may evaluate more than once; the last result stored wins. Errors are
    /// returned to the caller and never cached, and neither are results for
    /// clients the evaluator reports as not cacheable. A result computed across
    /// an [`invalidate`](Self::invalidate) or [`clear`](Self::clear) is
    /// returned but not stored.
    pub fn get_or_compute(&self, client: &ClientData) -> Result<PermissionSet> {
        let Some(entries) = &self.entries else {
            return self.evaluator.evaluate(client);
        };

        if !self.evaluator.is_cacheable(client) {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            trace!(client_id = ?client.client_id, "Client not cacheable, evaluating directly");
            return self.evaluator.evaluate(client);
        }

        let key = client.client_id.as_str();
        let now = self.clock.now();

        let generation = {
            let mut entries = entries.lock();
            let cached = entries
                .get(key)
                .map(|entry| (entry.is_fresh(now), entry.permissions.clone()));

            match cached {
                Some((true, permissions)) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    trace!(client_id = %key, "Permission cache hit");
                    return Ok(permissions);
                }
                Some((false, _)) => {
                    entries.pop(key);
                    self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                    trace!(client_id = %key, "Permission cache entry expired");
                }
                None => {}
            }
            self.generation.load(Ordering::Acquire)
        };

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let permissions = self.evaluator.evaluate(client)?;

        let mut entries = entries.lock();
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(client_id = %key, "Cache invalidated during evaluation, not storing");
            return Ok(permissions);
        }

        let entry = CacheEntry::new(permissions.clone(), self.clock.now(), self.ttl);
        if let Some((evicted, _)) = entries.push(key.to_string(), entry) {
            if evicted != key {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(client_id = %evicted, "Evicted least recently used permissions");
            }
        }

        Ok(permissions)
    }

    /// Drop the cached permissions of one client
    ///
    /// Evaluations already in flight when this is called will not store their
    /// result.
    pub fn invalidate(&self, client_id: &str) -> bool {
        let Some(entries) = &self.entries else {
            return false;
        };

        let mut entries = entries.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.pop(client_id).is_some()
    }

    /// Drop every cached entry, including results of in-flight evaluations
    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            let mut entries = entries.lock();
            self.generation.fetch_add(1, Ordering::AcqRel);
            entries.clear();
        }
    }

    /// Remove expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let Some(entries) = &self.entries else {
            return 0;
        };

        let now = self.clock.now();
        let mut entries = entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now))
            .map(|(client_id, _)| client_id.clone())
            .collect();

        for client_id in &expired {
            entries.pop(client_id);
        }

        self.counters
            .expirations
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }
}

impl<E: PermissionEvaluator> PermissionEvaluator for PermissionCache<E> {
    fn evaluate(&self, client: &ClientData) -> Result<PermissionSet> {
        self.get_or_compute(client)
    }

    fn name(&self) -> &str {
        self.evaluator.name()
    }

    fn is_cacheable(&self, client: &ClientData) -> bool {
        self.evaluator.is_cacheable(client)
    }
}
