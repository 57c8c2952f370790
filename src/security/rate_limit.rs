//! Fixed-window rate limiting keyed by client and path.
//!
//! # Responsibilities
//! - Resolve the per-path limit from the configured policy
//! - Count requests per `client:path` key inside a fixed window
//! - Sweep expired records once the table grows past a threshold
//!
//! # Design Decisions
//! - The counter table sits behind [`RateLimitStore`] so a shared store can
//!   replace the in-memory one without touching the decision logic
//! - The policy is swapped atomically on config reload; counters survive
//! - Limits are process-local: N instances allow N times the limit

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::RateLimitConfig;

/// Per-path request limits for one window length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub enabled: bool,
    pub window: Duration,
    pub default_limit: u32,
    overrides: HashMap<String, u32>,
}

impl RateLimitPolicy {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            window: Duration::from_secs(config.window_secs),
            default_limit: config.default_limit,
            overrides: config
                .overrides
                .iter()
                .map(|route| (route.path.clone(), route.limit))
                .collect(),
        }
    }

    /// Requests allowed per window on `path`. Paths match exactly.
    pub fn limit_for(&self, path: &str) -> u32 {
        self.overrides
            .get(path)
            .copied()
            .unwrap_or(self.default_limit)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

/// Counter state for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    /// Requests seen in the current window.
    pub count: u32,
    /// When the current window ends.
    pub reset_at: Instant,
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The request fits in the window; `count` includes it.
    Allowed { count: u32, limit: u32 },
    /// The window is exhausted until `retry_after` elapses.
    Limited { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Storage for fixed-window counters.
///
/// `hit` must be atomic per key: concurrent hits on one key never lose an increment.
pub trait RateLimitStore: Send + Sync {
    /// Count one request against `key` and decide whether it may proceed.
    fn hit(&self, key: &str, limit: u32, window: Duration, now: Instant) -> RateLimitDecision;

    /// Delete every record whose window ended at or before `now`.
    /// Returns the number of records removed.
    fn sweep_expired(&self, now: Instant) -> usize;

    /// Number of tracked keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local counter table.
pub struct MemoryRateLimitStore {
    records: DashMap<String, RateLimitRecord>,
    sweep_threshold: usize,
}

impl MemoryRateLimitStore {
    pub fn new(sweep_threshold: usize) -> Self {
        Self {
            records: DashMap::new(),
            sweep_threshold,
        }
    }

    /// Current record for `key`, if any.
    pub fn record(&self, key: &str) -> Option<RateLimitRecord> {
        self.records.get(key).map(|r| *r.value())
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    fn hit(&self, key: &str, limit: u32, window: Duration, now: Instant) -> RateLimitDecision {
        // The entry guard holds the shard lock for the whole read-modify-write.
        let decision = match self.records.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                if record.reset_at <= now {
                    *record = RateLimitRecord {
                        count: 1,
                        reset_at: now + window,
                    };
                    RateLimitDecision::Allowed { count: 1, limit }
                } else if record.count >= limit {
                    RateLimitDecision::Limited {
                        retry_after: record.reset_at.saturating_duration_since(now),
                    }
                } else {
                    record.count += 1;
                    RateLimitDecision::Allowed {
                        count: record.count,
                        limit,
                    }
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(RateLimitRecord {
                    count: 1,
                    reset_at: now + window,
                });
                RateLimitDecision::Allowed { count: 1, limit }
            }
        };

        if self.records.len() > self.sweep_threshold {
            let removed = self.sweep_expired(now);
            tracing::debug!(removed, remaining = self.records.len(), "Swept expired rate limit records");
        }

        decision
    }

    fn sweep_expired(&self, now: Instant) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.reset_at > now);
        before.saturating_sub(self.records.len())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Build the counter key for a client and path.
pub fn rate_limit_key(client: &str, path: &str) -> String {
    format!("{client}:{path}")
}

/// Applies the current policy against a counter store.
pub struct RateLimiter {
    policy: ArcSwap<RateLimitPolicy>,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy, store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
            store,
        }
    }

    /// Limiter backed by a process-local table.
    pub fn in_memory(config: &RateLimitConfig) -> Self {
        Self::new(
            RateLimitPolicy::from_config(config),
            Arc::new(MemoryRateLimitStore::new(config.sweep_threshold)),
        )
    }

    pub fn policy(&self) -> Arc<RateLimitPolicy> {
        self.policy.load_full()
    }

    /// Replace the policy. Existing counters are kept.
    pub fn reload(&self, policy: RateLimitPolicy) {
        tracing::info!(
            enabled = policy.enabled,
            default_limit = policy.default_limit,
            window_secs = policy.window.as_secs(),
            "Rate limit policy reloaded"
        );
        self.policy.store(Arc::new(policy));
    }

    pub fn check(&self, client: &str, path: &str) -> RateLimitDecision {
        self.check_at(client, path, Instant::now())
    }

    pub fn check_at(&self, client: &str, path: &str, now: Instant) -> RateLimitDecision {
        let policy = self.policy.load();
        let limit = policy.limit_for(path);
        if !policy.enabled {
            return RateLimitDecision::Allowed { count: 0, limit };
        }
        self.store
            .hit(&rate_limit_key(client, path), limit, policy.window, now)
    }

    /// Drop expired counters regardless of table size.
    pub fn sweep(&self) -> usize {
        self.store.sweep_expired(Instant::now())
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteLimit;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn test_policy_overrides() {
        let policy = RateLimitPolicy::default();
        assert_eq!(policy.limit_for("/api/auth/login"), 20);
        assert_eq!(policy.limit_for("/api/me/profile-image"), 30);
        assert_eq!(policy.limit_for("/api/media/upload"), 30);
        assert_eq!(policy.limit_for("/api/media/giphy/search"), 20);
        assert_eq!(policy.limit_for("/api/media/giphy/import"), 10);
        assert_eq!(policy.limit_for("/api/conversations"), 120);
        assert_eq!(policy.limit_for("/api/auth/login/"), 120);
        assert_eq!(policy.window, WINDOW);
    }

    #[test]
    fn test_limit_boundary() {
        let store = MemoryRateLimitStore::new(5_000);
        let now = Instant::now();

        for i in 1..=5 {
            assert_eq!(
                store.hit("k", 5, WINDOW, now),
                RateLimitDecision::Allowed { count: i, limit: 5 }
            );
        }
        assert!(!store.hit("k", 5, WINDOW, now).is_allowed());
        // Rejections do not count.
        assert_eq!(store.record("k").unwrap().count, 5);
    }

    #[test]
    fn test_retry_after_is_remaining_window() {
        let store = MemoryRateLimitStore::new(5_000);
        let start = Instant::now();
        store.hit("k", 1, WINDOW, start);

        let decision = store.hit("k", 1, WINDOW, start + Duration::from_secs(45));
        assert_eq!(
            decision,
            RateLimitDecision::Limited {
                retry_after: Duration::from_secs(15)
            }
        );
    }

    #[test]
    fn test_window_reset_starts_at_one() {
        let store = MemoryRateLimitStore::new(5_000);
        let start = Instant::now();
        for _ in 0..3 {
            store.hit("k", 3, WINDOW, start);
        }
        assert!(!store.hit("k", 3, WINDOW, start + Duration::from_secs(59)).is_allowed());

        let later = start + WINDOW;
        assert_eq!(
            store.hit("k", 3, WINDOW, later),
            RateLimitDecision::Allowed { count: 1, limit: 3 }
        );
        let record = store.record("k").unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.reset_at, later + WINDOW);
    }

    #[test]
    fn test_sweep_above_threshold() {
        let store = MemoryRateLimitStore::new(2);
        let start = Instant::now();
        store.hit("a", 10, WINDOW, start);
        store.hit("b", 10, WINDOW, start);
        assert_eq!(store.len(), 2);

        // Third key pushes the table over the threshold; the first two have expired.
        store.hit("c", 10, WINDOW, start + WINDOW);
        assert_eq!(store.len(), 1);
        assert!(store.record("c").is_some());
    }

    #[test]
    fn test_no_sweep_at_threshold() {
        let store = MemoryRateLimitStore::new(2);
        let start = Instant::now();
        store.hit("a", 10, WINDOW, start);
        store.hit("b", 10, WINDOW, start + WINDOW);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_concurrent_hits_never_lose_increments() {
        let store = MemoryRateLimitStore::new(5_000);
        let now = Instant::now();

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..10 {
                        assert!(store.hit("shared", 120, WINDOW, now).is_allowed());
                    }
                });
            }
        });

        assert_eq!(store.record("shared").unwrap().count, 80);
    }

    #[test]
    fn test_concurrent_hits_admit_exactly_limit() {
        let store = MemoryRateLimitStore::new(5_000);
        let now = Instant::now();
        let allowed = std::sync::atomic::AtomicU32::new(0);

        std::thread::scope(|s| {
            for _ in 0..10 {
                s.spawn(|| {
                    for _ in 0..20 {
                        if store.hit("shared", 120, WINDOW, now).is_allowed() {
                            allowed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(allowed.into_inner(), 120);
    }

    #[test]
    fn test_limiter_keys_by_client_and_path() {
        let mut config = RateLimitConfig::default();
        config.overrides = vec![RouteLimit::new("/api/auth/login", 2)];
        let limiter = RateLimiter::in_memory(&config);
        let now = Instant::now();

        assert!(limiter.check_at("1.1.1.1", "/api/auth/login", now).is_allowed());
        assert!(limiter.check_at("1.1.1.1", "/api/auth/login", now).is_allowed());
        assert!(!limiter.check_at("1.1.1.1", "/api/auth/login", now).is_allowed());

        assert!(limiter.check_at("2.2.2.2", "/api/auth/login", now).is_allowed());
        assert!(limiter.check_at("1.1.1.1", "/api/me", now).is_allowed());
        assert_eq!(limiter.tracked_keys(), 3);
    }

    #[test]
    fn test_reload_and_disable() {
        let limiter = RateLimiter::in_memory(&RateLimitConfig::default());
        let now = Instant::now();

        let mut config = RateLimitConfig::default();
        config.default_limit = 1;
        limiter.reload(RateLimitPolicy::from_config(&config));
        assert!(limiter.check_at("c", "/api/me", now).is_allowed());
        assert!(!limiter.check_at("c", "/api/me", now).is_allowed());

        config.enabled = false;
        limiter.reload(RateLimitPolicy::from_config(&config));
        assert_eq!(
            limiter.check_at("c", "/api/me", now),
            RateLimitDecision::Allowed { count: 0, limit: 1 }
        );
    }
}
